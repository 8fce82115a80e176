// Helper for generating UUIDv7 (timestamp-sortable UUIDs)
//
// Refresh tokens, sessions and session items are generated app-side with
// UUIDv7 so rows sort by creation time. Users keep PG's gen_random_uuid().

use uuid::Uuid;

/// Generate a new UUIDv7 (timestamp-sortable).
pub fn uuidv7() -> Uuid {
    Uuid::now_v7()
}
