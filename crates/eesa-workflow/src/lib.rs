//! EESA Workflow: identity, registry, approval, reviewer and audit
//! services over the `eesa-core` repository traits.

pub mod approval;
pub mod audit;
pub mod config;
pub mod error;
pub mod groups;
pub mod identity;
pub mod password;
pub mod registry;
pub mod reviewer;
pub mod students;

pub use approval::{
    ApprovalPolicy, ApprovalScope, ApprovalService, PeerReviewPolicy, StaffApprovalPolicy,
};
pub use audit::AuditService;
pub use config::WorkflowConfig;
pub use error::WorkflowError;
pub use groups::{GroupTemplate, management_groups};
pub use identity::IdentityService;
pub use registry::RegistryService;
pub use reviewer::ReviewerService;
pub use students::StudentService;
