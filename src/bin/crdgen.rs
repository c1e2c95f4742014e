//! CRD YAML Generator
//!
//! This binary generates the Kubernetes CRD manifest for the ReplicaPool
//! custom resource.
//!
//! Usage: cargo run --bin crdgen > deploy/crds/replicapool.yaml

use replica_pool_operator::crd::generate_crds;

fn main() -> anyhow::Result<()> {
    for crd in generate_crds()? {
        println!("---");
        print!("{}", crd);
    }
    Ok(())
}
