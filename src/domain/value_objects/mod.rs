mod deployment_state;
mod device_id;
mod sub_document_name;

pub use deployment_state::DeploymentState;
pub use device_id::DeviceId;
pub use sub_document_name::SubDocumentName;
