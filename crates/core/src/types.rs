/// Backend-assigned generation ids are integer row ids.
pub type JobId = i64;
