// ABOUTME: Compile-fail test: history is only written after the swap.
// ABOUTME: record() is not available on a Deployment<Loaded>.

use chrono::Utc;
use tugboat::deploy::{Deployment, Loaded};
use tugboat::history::HistoryStore;

fn try_record(deployment: Deployment<Loaded>) {
    let store = HistoryStore::new("history.json");

    // ERROR: record() doesn't exist on Deployment<Loaded>
    let _ = deployment.record(&store, Utc::now());
}

fn main() {}
