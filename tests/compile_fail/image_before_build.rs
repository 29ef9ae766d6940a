// ABOUTME: Compile-fail test: there is no image before the build step.
// ABOUTME: image() requires a state that carries a built artifact.

use tugboat::deploy::{Deployment, Validated};

fn try_image(deployment: &Deployment<Validated>) {
    // ERROR: Validated does not carry an artifact
    let _ = deployment.image();
}

fn main() {}
