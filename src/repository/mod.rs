pub mod cam_records;
