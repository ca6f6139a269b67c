pub mod cam_analytics;
pub mod cam_catalog;
pub mod cam_export;
pub mod cam_model;
pub mod cam_reconciliation;
pub mod cam_workflow;
