//! Credential Secret builder

use super::child_meta;
use crate::credentials::{Credentials, PASSWORD_KEY, USERNAME_KEY};
use crate::error::ControllerError;
use crate::naming;
use crds::Logstash;
use k8s_openapi::ByteString;
use k8s_openapi::api::core::v1::Secret;
use std::collections::BTreeMap;

/// Builds the `logstash-{name}-user` Secret holding `credentials`
pub fn build_secret(instance: &Logstash, credentials: &Credentials) -> Result<Secret, ControllerError> {
    let (namespace, name) = naming::object_key(instance)?;
    Ok(Secret {
        metadata: child_meta(name, namespace, naming::secret_name(name)),
        data: Some(BTreeMap::from([
            (
                USERNAME_KEY.to_string(),
                ByteString(credentials.username.as_bytes().to_vec()),
            ),
            (
                PASSWORD_KEY.to_string(),
                ByteString(credentials.password.as_bytes().to_vec()),
            ),
        ])),
        ..Default::default()
    })
}
