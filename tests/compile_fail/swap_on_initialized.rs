// ABOUTME: Compile-fail test: an unvalidated deployment cannot be swapped in.
// ABOUTME: swap() only exists once the image is loaded on the remote host.

use tugboat::config::Config;
use tugboat::deploy::{DeployPlan, Deployment, Initialized};
use tugboat::diagnostics::Diagnostics;

async fn try_swap<R: tugboat::ssh::RemoteShell>(config: &Config, remote: &R) {
    let plan = DeployPlan::from_config(config).unwrap();
    let deployment: Deployment<Initialized> = Deployment::new(plan);
    let mut diag = Diagnostics::default();

    // ERROR: swap() doesn't exist on Deployment<Initialized>
    let _ = deployment.swap(remote, &mut diag).await;
}

fn main() {}
