//! Registry of well-known reusable actions and their outputs
//!
//! When a step uses one of these actions, the step's `outputs` context type
//! can be populated precisely instead of falling back to an open string map.
//! The registry is the single source of truth for this data and is kept as
//! YAML so new actions are a data edit, not a code change. Entries are keyed
//! by the exact `uses:` reference including the version ref; a version not
//! listed here is unknown and its outputs stay untyped.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::Deserialize;

/// Outputs metadata for one well-known action reference.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WellKnownAction {
    /// Output names the action declares, with a short description.
    #[serde(default)]
    pub outputs: HashMap<String, String>,
    /// The action's outputs cannot be enumerated statically (it writes
    /// arbitrary outputs at runtime), so any property must be accepted.
    #[serde(default)]
    pub skip_outputs: bool,
}

const WELL_KNOWN_ACTIONS_YAML: &str = r#"
actions/checkout@v3: &checkout
  outputs:
    ref: "the branch, tag or SHA that was checked out"
    commit: "the commit SHA that was checked out"
actions/checkout@v4: *checkout
actions/cache@v3: &cache
  outputs:
    cache-hit: "whether an exact match was found for the key"
actions/cache@v4: *cache
actions/cache/restore@v3: &cache-restore
  outputs:
    cache-hit: "whether an exact match was found for the key"
    cache-primary-key: "the key given as input"
    cache-matched-key: "the key of the restored cache"
actions/cache/restore@v4: *cache-restore
actions/setup-node@v3: &setup-node
  outputs:
    cache-hit: "whether a cache was hit for the package manager"
    node-version: "the installed node version"
actions/setup-node@v4: *setup-node
actions/setup-python@v4: &setup-python
  outputs:
    python-version: "the installed python version"
    cache-hit: "whether a cache was hit for pip/pipenv/poetry"
    python-path: "absolute path to the python executable"
actions/setup-python@v5: *setup-python
actions/setup-go@v4: &setup-go
  outputs:
    go-version: "the installed go version"
    cache-hit: "whether a cache was hit for go modules"
actions/setup-go@v5: *setup-go
actions/setup-java@v3: &setup-java
  outputs:
    distribution: "the distribution of the installed jdk"
    version: "the actual version of the installed jdk"
    path: "path to where the jdk was installed"
    cache-hit: "whether a cache was hit for the build tool"
actions/setup-java@v4: *setup-java
actions/upload-artifact@v3: &upload-artifact
  outputs:
    artifact-id: "id of the uploaded artifact"
    artifact-url: "download url of the uploaded artifact"
    artifact-digest: "sha-256 digest of the uploaded artifact"
actions/upload-artifact@v4: *upload-artifact
actions/download-artifact@v3: &download-artifact
  outputs:
    download-path: "absolute path where the artifact was downloaded"
actions/download-artifact@v4: *download-artifact
actions/create-github-app-token@v1: &create-github-app-token
  outputs:
    token: "the installation access token"
    installation-id: "the app installation id"
    app-slug: "the slug of the github app"
actions/create-github-app-token@v2: *create-github-app-token
actions/github-script@v6: &github-script
  skip_outputs: true
actions/github-script@v7: *github-script
docker/build-push-action@v5: &build-push-action
  outputs:
    imageid: "image id of the built image"
    digest: "image digest of the built image"
    metadata: "build result metadata"
docker/build-push-action@v6: *build-push-action
docker/metadata-action@v4: &metadata-action
  outputs:
    version: "generated docker image version"
    tags: "generated docker tags"
    labels: "generated docker labels"
    annotations: "generated annotations"
    json: "json output of tags and labels"
docker/metadata-action@v5: *metadata-action
"#;

static WELL_KNOWN_ACTIONS: Lazy<HashMap<String, WellKnownAction>> = Lazy::new(|| {
    serde_yaml::from_str(WELL_KNOWN_ACTIONS_YAML)
        .unwrap_or_else(|err| panic!("well-known actions registry is broken: {err}"))
});

/// Looks up outputs metadata for a `uses:` specification like
/// `actions/checkout@v4`. The reference string must match a registry entry
/// exactly; an unlisted version returns `None`.
pub fn well_known_action(uses: &str) -> Option<&'static WellKnownAction> {
    WELL_KNOWN_ACTIONS.get(uses)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_keyed_by_exact_reference() {
        let action = well_known_action("actions/checkout@v4").unwrap();
        assert!(action.outputs.contains_key("ref"));
        assert!(action.outputs.contains_key("commit"));
        assert!(!action.skip_outputs);
        assert!(well_known_action("actions/checkout@v999").is_none());
        assert!(well_known_action("actions/checkout").is_none());
    }

    #[test]
    fn test_lookup_nested_path() {
        let action = well_known_action("actions/cache/restore@v4").unwrap();
        assert!(action.outputs.contains_key("cache-matched-key"));
    }

    #[test]
    fn test_aliased_versions_share_outputs() {
        let v3 = well_known_action("actions/setup-node@v3").unwrap();
        let v4 = well_known_action("actions/setup-node@v4").unwrap();
        assert_eq!(v3.outputs.len(), v4.outputs.len());
        assert!(v4.outputs.contains_key("node-version"));
    }

    #[test]
    fn test_github_script_skips_outputs() {
        let action = well_known_action("actions/github-script@v7").unwrap();
        assert!(action.skip_outputs);
        assert!(action.outputs.is_empty());
    }

    #[test]
    fn test_unknown_action() {
        assert!(well_known_action("someone/their-action@v1").is_none());
    }
}
