/// Body of every folder's `/health` route.
pub const HEALTH_BODY: &str = "active";

pub async fn health_check() -> &'static str {
    HEALTH_BODY
}
