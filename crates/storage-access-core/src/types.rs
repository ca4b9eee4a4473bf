//! Strong type definitions for security-context identity.
//!
//! Origins and principals are newtypes so that a tracking origin can never be
//! confused with a permission key or a raw URL at compile time.

use serde::{Deserialize, Serialize};
use std::fmt;
use url::{Host, Url};

use crate::error::{CoreError, Result};

/// URI scheme used by browser extensions.
///
/// Contexts loaded from this scheme are always exempt from storage policy.
pub const EXTENSION_SCHEME: &str = "moz-extension";

/// Prefix of every storage-access permission type.
const STORAGE_PERMISSION_PREFIX: &str = "3rdPartyStorage^";

/// Canonical `scheme://host[:port]` identity of a security context.
///
/// Default ports are elided and hosts are lower-cased, so two spellings of
/// the same origin compare equal.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Origin {
    scheme: String,
    host: String,
    port: Option<u16>,
}

impl Origin {
    /// Parse an origin out of any absolute URL.
    ///
    /// Path, query and fragment are discarded.
    pub fn parse(input: &str) -> Result<Self> {
        let url = Url::parse(input).map_err(|e| CoreError::InvalidOrigin(format!("{input}: {e}")))?;
        Self::from_url(&url)
    }

    /// Build an origin from a parsed URL.
    pub fn from_url(url: &Url) -> Result<Self> {
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| CoreError::MissingHost(url.to_string()))?;
        Ok(Self {
            scheme: url.scheme().to_ascii_lowercase(),
            host: host.to_ascii_lowercase(),
            port: url.port(),
        })
    }

    /// Build an origin from already-canonical parts.
    pub fn from_parts(scheme: &str, host: &str, port: Option<u16>) -> Self {
        Self {
            scheme: scheme.to_ascii_lowercase(),
            host: host.to_ascii_lowercase(),
            port,
        }
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Whether this origin belongs to a browser extension.
    pub fn is_extension(&self) -> bool {
        self.scheme == EXTENSION_SCHEME
    }

    /// ASCII serialization without any origin-attribute suffix.
    pub fn ascii_serialization(&self) -> String {
        match self.port {
            Some(port) => format!("{}://{}:{}", self.scheme, self.host, port),
            None => format!("{}://{}", self.scheme, self.host),
        }
    }

    /// The registrable domain ("site") of this origin.
    ///
    /// Looked up in the public suffix list. IP addresses, single-label hosts
    /// and hosts that are themselves a public suffix are their own site.
    pub fn base_domain(&self) -> &str {
        let host = self.host.trim_end_matches('.');
        if is_ip_literal(host) {
            return host;
        }
        psl::domain_str(host).unwrap_or(host)
    }

    /// Same-site comparison used for third-party tests.
    pub fn is_same_site(&self, other: &Origin) -> bool {
        self.base_domain() == other.base_domain()
    }
}

fn is_ip_literal(host: &str) -> bool {
    if host.starts_with('[') {
        return true;
    }
    matches!(Host::parse(host), Ok(Host::Ipv4(_)) | Ok(Host::Ipv6(_)))
}

impl fmt::Debug for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Origin({})", self.ascii_serialization())
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.ascii_serialization())
    }
}

impl std::str::FromStr for Origin {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// What sort of security context a principal stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrincipalKind {
    /// Web content loaded from an origin.
    Content,
    /// The privileged system principal.
    System,
    /// A sandboxed, opaque principal.
    Null,
}

/// A security context: an origin plus the attributes that scope its storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    origin: Origin,
    kind: PrincipalKind,
    private_browsing_id: u32,
    is_extension: bool,
}

impl Principal {
    /// A content principal for the given origin.
    pub fn content(origin: Origin) -> Self {
        let is_extension = origin.is_extension();
        Self {
            origin,
            kind: PrincipalKind::Content,
            private_browsing_id: 0,
            is_extension,
        }
    }

    /// Parse a URL and wrap it in a content principal.
    pub fn from_url(input: &str) -> Result<Self> {
        Ok(Self::content(Origin::parse(input)?))
    }

    /// An extension principal. Extension principals are always policy-exempt.
    pub fn extension(origin: Origin) -> Self {
        Self {
            is_extension: true,
            ..Self::content(origin)
        }
    }

    /// The system principal.
    pub fn system() -> Self {
        Self {
            origin: Origin::from_parts("resource", "system-principal", None),
            kind: PrincipalKind::System,
            private_browsing_id: 0,
            is_extension: false,
        }
    }

    /// An opaque null principal (e.g. a sandboxed document).
    pub fn null(origin: Origin) -> Self {
        Self {
            origin,
            kind: PrincipalKind::Null,
            private_browsing_id: 0,
            is_extension: false,
        }
    }

    /// Move this principal into a private-browsing session.
    pub fn with_private_browsing_id(mut self, id: u32) -> Self {
        self.private_browsing_id = id;
        self
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn kind(&self) -> PrincipalKind {
        self.kind
    }

    pub fn is_content(&self) -> bool {
        self.kind == PrincipalKind::Content
    }

    pub fn is_extension(&self) -> bool {
        self.is_extension
    }

    pub fn private_browsing_id(&self) -> u32 {
        self.private_browsing_id
    }

    pub fn is_private(&self) -> bool {
        self.private_browsing_id > 0
    }

    /// Origin serialization including origin attributes.
    ///
    /// This is the identity under which permissions are stored, so grants
    /// made in a private session never alias normal ones.
    pub fn origin_with_suffix(&self) -> String {
        let base = self.origin.ascii_serialization();
        if self.private_browsing_id > 0 {
            format!("{base}^privateBrowsingId={}", self.private_browsing_id)
        } else {
            base
        }
    }
}

/// Permission type recording a storage-access grant for one tracking origin.
///
/// The key is a prefix followed by the tracking origin, so it is
/// deterministic and distinct origins never share a key.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermissionKey(String);

impl PermissionKey {
    /// Derive the key for a tracking origin string.
    pub fn for_origin(tracking_origin: &str) -> Self {
        Self(format!("{STORAGE_PERMISSION_PREFIX}{tracking_origin}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Recover the tracking origin this key was derived from.
    pub fn tracking_origin(&self) -> &str {
        self.0
            .strip_prefix(STORAGE_PERMISSION_PREFIX)
            .unwrap_or(&self.0)
    }

    /// Whether a raw permission type is a storage-access key.
    pub fn is_storage_key(permission_type: &str) -> bool {
        permission_type.starts_with(STORAGE_PERMISSION_PREFIX)
    }
}

impl fmt::Debug for PermissionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PermissionKey({})", self.0)
    }
}

impl fmt::Display for PermissionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PermissionKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
