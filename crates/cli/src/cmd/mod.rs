mod deploy;
mod links;

pub use deploy::{DeployArgs, cmd_deploy};
pub use links::{cmd_links_create, cmd_links_remove};
