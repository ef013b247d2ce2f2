//! Merge helpers used by the builders
//!
//! All merges are keyed by name and return a fresh container; inputs are never
//! modified. Labels and env vars are right-biased (the incoming side wins), the
//! pipeline volume and mount are only added when the user has not declared an
//! entry with the reserved name.

use k8s_openapi::api::core::v1::{ConfigMapVolumeSource, EnvVar, Volume, VolumeMount};
use std::collections::BTreeMap;

/// Reserved name of the pipeline volume and its mount
pub const PIPELINE_VOLUME: &str = "pipeline";
/// Where Logstash reads pipeline definitions from
pub const PIPELINE_MOUNT_PATH: &str = "/usr/share/logstash/pipeline";

/// Union of two label maps; keys in `overrides` replace keys in `base`
pub fn merge_labels(
    base: Option<&BTreeMap<String, String>>,
    overrides: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut merged = base.cloned().unwrap_or_default();
    merged.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

/// Env var merge by name
///
/// An incoming entry replaces the existing entry with the same name in place;
/// entries with new names are appended in order.
pub fn merge_env(base: &[EnvVar], incoming: &[EnvVar]) -> Vec<EnvVar> {
    let mut merged = base.to_vec();
    for var in incoming {
        match merged.iter_mut().find(|existing| existing.name == var.name) {
            Some(existing) => *existing = var.clone(),
            None => merged.push(var.clone()),
        }
    }
    merged
}

/// Appends the pipeline ConfigMap volume unless a volume named `pipeline` exists
pub fn merge_pipeline_volume(volumes: &[Volume], config_map_name: &str) -> Vec<Volume> {
    let mut merged = volumes.to_vec();
    if !merged.iter().any(|v| v.name == PIPELINE_VOLUME) {
        merged.push(Volume {
            name: PIPELINE_VOLUME.to_string(),
            config_map: Some(ConfigMapVolumeSource {
                name: config_map_name.to_string(),
                ..Default::default()
            }),
            ..Default::default()
        });
    }
    merged
}

/// Appends the pipeline mount unless a mount named `pipeline` exists
pub fn merge_pipeline_volume_mount(mounts: &[VolumeMount]) -> Vec<VolumeMount> {
    let mut merged = mounts.to_vec();
    if !merged.iter().any(|m| m.name == PIPELINE_VOLUME) {
        merged.push(VolumeMount {
            name: PIPELINE_VOLUME.to_string(),
            mount_path: PIPELINE_MOUNT_PATH.to_string(),
            ..Default::default()
        });
    }
    merged
}
