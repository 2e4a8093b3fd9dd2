pub mod car_id;
pub mod verify_ingest;
