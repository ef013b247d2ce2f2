//! Prints the Logstash CustomResourceDefinition as YAML.
//!
//! Usage: `cargo run -p crds --bin crdgen > config/crd/logstash.yaml`

use crds::Logstash;
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    let yaml = serde_yaml::to_string(&Logstash::crd())?;
    print!("{yaml}");
    Ok(())
}
