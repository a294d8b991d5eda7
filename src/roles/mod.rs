pub mod client;
pub mod naming;
pub mod scope;

pub use client::RoleClient;
pub use naming::RoleName;
pub use scope::with_role;
