//! Docker distribution media types
//!
//! Constants for the manifest and blob media types accepted by v2
//! registries, for use as `Accept` values on manifest requests.

pub const MANIFEST_SCHEMA1_MIME: &str = "application/vnd.docker.distribution.manifest.v1+json";
pub const MANIFEST_SCHEMA1_SIGNED_MIME: &str =
    "application/vnd.docker.distribution.manifest.v1+prettyjws";
pub const MANIFEST_SCHEMA2_MIME: &str = "application/vnd.docker.distribution.manifest.v2+json";
pub const MANIFEST_LIST_MIME: &str =
    "application/vnd.docker.distribution.manifest.list.v2+json";
pub const LAYER_MIME: &str = "application/vnd.docker.image.rootfs.diff.tar.gzip";
pub const CONFIG_JSON_MIME: &str = "application/vnd.docker.container.image.v1+json";

pub const MANIFEST_SCHEMA1_MIMES: &[&str] = &[MANIFEST_SCHEMA1_MIME, MANIFEST_SCHEMA1_SIGNED_MIME];
pub const MANIFEST_SCHEMA2_MIMES: &[&str] = &[MANIFEST_SCHEMA2_MIME];
pub const SUPPORTED_MANIFEST_MIMES: &[&str] = &[
    MANIFEST_SCHEMA1_MIME,
    MANIFEST_SCHEMA1_SIGNED_MIME,
    MANIFEST_SCHEMA2_MIME,
    MANIFEST_LIST_MIME,
];
