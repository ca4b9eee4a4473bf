//! Snapshot of a network load.
//!
//! The host fills a [`ChannelInfo`] from its channel and load-info objects.
//! Each `Option` field distinguishes "the host could not tell" from a real
//! answer, because the channel entry point treats several of those gaps as
//! fail-open.

use storage_access_core::{Origin, Principal};

use crate::collaborators::{Classification, CookieJarSettings};

/// Answer of the host's third-party utility for a load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ThirdPartyVerdict {
    /// The host has no third-party utility. Storage is allowed.
    #[default]
    Unavailable,
    /// The utility ran and failed, e.g. for a system-principal load.
    /// Evaluation carries on as for a third party.
    Failed,
    Known(bool),
}

/// Everything the channel entry point reads from a load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelInfo {
    /// Final URI after redirects. `None` when the host could not resolve it.
    pub final_uri: Option<Origin>,
    /// Raw URI of the load, the tracking URI. `None` when unavailable.
    pub uri: Option<String>,

    pub top_level_principal: Option<Principal>,
    pub top_level_storage_area_principal: Option<Principal>,
    pub loading_principal: Option<Principal>,
    pub triggering_principal: Option<Principal>,
    /// Result principal of a document load.
    pub result_principal: Option<Principal>,
    /// Principal minted from the channel URI.
    pub channel_principal: Option<Principal>,

    pub is_http: bool,
    pub is_main_document: bool,

    pub cookie_jar_settings: Option<CookieJarSettings>,
    /// Classifier verdict attached to the load. `None` if never classified.
    pub classification: Option<Classification>,
    pub third_party: ThirdPartyVerdict,
}

impl ChannelInfo {
    /// An HTTP(S) subresource load of `url` with every derived field filled.
    ///
    /// Settings, classification and third-partiness stay unset.
    pub fn for_load(url: &str) -> Self {
        let final_uri = Origin::parse(url).ok();
        let is_http = final_uri
            .as_ref()
            .map(|o| matches!(o.scheme(), "http" | "https"))
            .unwrap_or(false);
        Self {
            channel_principal: final_uri.clone().map(Principal::content),
            final_uri,
            uri: Some(url.to_string()),
            is_http,
            ..Self::default()
        }
    }

    pub fn with_top_level_principal(mut self, principal: Principal) -> Self {
        self.top_level_principal = Some(principal);
        self
    }

    pub fn with_storage_area_principal(mut self, principal: Principal) -> Self {
        self.top_level_storage_area_principal = Some(principal);
        self
    }

    pub fn with_loading_principal(mut self, principal: Principal) -> Self {
        self.loading_principal = Some(principal);
        self
    }

    pub fn with_triggering_principal(mut self, principal: Principal) -> Self {
        self.triggering_principal = Some(principal);
        self
    }

    pub fn with_result_principal(mut self, principal: Principal) -> Self {
        self.result_principal = Some(principal);
        self
    }

    pub fn with_channel_principal(mut self, principal: Principal) -> Self {
        self.channel_principal = Some(principal);
        self
    }

    pub fn with_cookie_jar_settings(mut self, settings: CookieJarSettings) -> Self {
        self.cookie_jar_settings = Some(settings);
        self
    }

    pub fn classified(mut self, classification: Classification) -> Self {
        self.classification = Some(classification);
        self
    }

    pub fn third_party(mut self, third_party: bool) -> Self {
        self.third_party = ThirdPartyVerdict::Known(third_party);
        self
    }

    /// The third-party utility failed for this load.
    pub fn third_party_failed(mut self) -> Self {
        self.third_party = ThirdPartyVerdict::Failed;
        self
    }

    pub fn main_document(mut self) -> Self {
        self.is_main_document = true;
        self
    }

    /// Principal standing for the top-level document of this load.
    ///
    /// Falls back through the loading principal, the result principal of a
    /// main-document HTTP load, and finally the triggering principal.
    pub fn resolve_top_level_principal(&self) -> Option<&Principal> {
        self.top_level_principal
            .as_ref()
            .or(self.loading_principal.as_ref())
            .or_else(|| {
                if self.is_http && self.is_main_document {
                    self.result_principal.as_ref()
                } else {
                    None
                }
            })
            .or(self.triggering_principal.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(url: &str) -> Principal {
        Principal::from_url(url).unwrap()
    }

    #[test]
    fn test_for_load_fills_derived_fields() {
        let channel = ChannelInfo::for_load("https://tracker.test/pixel.gif");
        assert!(channel.is_http);
        assert_eq!(
            channel.final_uri.as_ref().map(|o| o.to_string()).as_deref(),
            Some("https://tracker.test")
        );
        assert_eq!(channel.channel_principal, Some(principal("https://tracker.test")));
        assert!(channel.cookie_jar_settings.is_none());
        assert_eq!(channel.third_party, ThirdPartyVerdict::Unavailable);
    }

    #[test]
    fn test_top_level_fallback_chain() {
        let base = ChannelInfo::for_load("https://tracker.test/a.js");
        assert_eq!(base.resolve_top_level_principal(), None);

        let triggering = base
            .clone()
            .with_triggering_principal(principal("https://trigger.example"));
        assert_eq!(
            triggering.resolve_top_level_principal(),
            Some(&principal("https://trigger.example"))
        );

        // The result principal only counts for HTTP main-document loads.
        let result = triggering
            .clone()
            .with_result_principal(principal("https://result.example"));
        assert_eq!(
            result.resolve_top_level_principal(),
            Some(&principal("https://trigger.example"))
        );
        assert_eq!(
            result.clone().main_document().resolve_top_level_principal(),
            Some(&principal("https://result.example"))
        );

        let loading = result.with_loading_principal(principal("https://loading.example"));
        assert_eq!(
            loading.resolve_top_level_principal(),
            Some(&principal("https://loading.example"))
        );

        let top = loading.with_top_level_principal(principal("https://news.example"));
        assert_eq!(
            top.resolve_top_level_principal(),
            Some(&principal("https://news.example"))
        );
    }
}
