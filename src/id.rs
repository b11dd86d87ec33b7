use uuid::Uuid;

/// Time-ordered primary keys; v7 keeps index pages append-mostly.
pub fn new_uuid_v7() -> String {
    Uuid::now_v7().to_string()
}
