//! Registration-time exposure rules.
//!
//! The allowlist and the write gate are independent filters; a tool is
//! exposed only when both pass. Allowlisting a mutating tool does not expose
//! it unless writes are enabled for the package.

use hub_config::PackagePolicy;
use hub_primitives::ToolDefinition;

/// Why a declared tool is or is not exposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exposure {
    /// The tool passes every filter.
    Exposed,
    /// The package has an allowlist that does not name this tool.
    NotAllowlisted,
    /// The tool mutates state and the package does not allow writes.
    WriteGated,
}

impl Exposure {
    /// Returns true for [`Exposure::Exposed`].
    #[must_use]
    pub fn is_exposed(self) -> bool {
        self == Self::Exposed
    }

    /// Short label for diagnostics.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Exposed => "exposed",
            Self::NotAllowlisted => "not in allowed_tools",
            Self::WriteGated => "mutating tool and allow_writes is false",
        }
    }
}

/// Classifies one declared tool against a package policy.
#[must_use]
pub fn classify(tool: &ToolDefinition, policy: &PackagePolicy) -> Exposure {
    let allowlisted = policy
        .allowed_tools
        .as_ref()
        .is_none_or(|allowed| allowed.contains(tool.name()));
    if !allowlisted {
        return Exposure::NotAllowlisted;
    }

    if tool.mutates() && !policy.allow_writes {
        return Exposure::WriteGated;
    }

    Exposure::Exposed
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use hub_primitives::PackageManifest;
    use serde_json::Value;

    fn tool(name: &str, mutates: bool) -> ToolDefinition {
        ToolDefinition::builder(name)
            .mutates(mutates)
            .handler(|_args: Value| async move { Ok(String::new()) })
            .build()
            .unwrap()
    }

    fn briefing() -> PackageManifest {
        PackageManifest::builder()
            .name("briefing")
            .unwrap()
            .version("1.0.0")
            .unwrap()
            .tool(tool("run_weekly_digest", false))
            .tool(tool("content_feed_status", false))
            .tool(tool("run_rss_digest", false))
            .tool(tool("save_for_later", true))
            .build()
            .unwrap()
    }

    fn exposed_tools<'a>(
        manifest: &'a PackageManifest,
        policy: &PackagePolicy,
    ) -> Vec<&'a ToolDefinition> {
        manifest
            .tools()
            .iter()
            .filter(|tool| classify(tool, policy).is_exposed())
            .collect()
    }

    fn names(tools: &[&ToolDefinition]) -> BTreeSet<String> {
        tools.iter().map(|tool| tool.name().to_owned()).collect()
    }

    #[test]
    fn write_tools_hidden_by_default() {
        let manifest = briefing();
        let exposed = exposed_tools(&manifest, &PackagePolicy::new("/p"));
        assert!(exposed.iter().all(|tool| !tool.mutates()));
        assert_eq!(exposed.len(), 3);

        let exposed = exposed_tools(&manifest, &PackagePolicy::new("/p").with_writes(true));
        assert_eq!(exposed.len(), 4);
    }

    #[test]
    fn allowlist_is_closed() {
        let manifest = briefing();
        let policy = PackagePolicy::new("/p")
            .with_allowed_tools(["run_weekly_digest", "content_feed_status"]);
        let exposed = names(&exposed_tools(&manifest, &policy));

        assert_eq!(
            exposed,
            BTreeSet::from(["run_weekly_digest".to_owned(), "content_feed_status".to_owned()])
        );
    }

    #[test]
    fn allowlist_does_not_bypass_write_gate() {
        let manifest = briefing();
        let policy = PackagePolicy::new("/p")
            .with_allowed_tools(["save_for_later", "run_rss_digest", "not_declared"]);
        let exposed = names(&exposed_tools(&manifest, &policy));
        assert_eq!(exposed, BTreeSet::from(["run_rss_digest".to_owned()]));

        let save = &manifest.tools()[3];
        assert_eq!(classify(save, &policy), Exposure::WriteGated);

        let policy = policy.with_writes(true);
        let exposed = names(&exposed_tools(&manifest, &policy));
        assert_eq!(
            exposed,
            BTreeSet::from(["run_rss_digest".to_owned(), "save_for_later".to_owned()])
        );
    }

    #[test]
    fn empty_allowlist_exposes_nothing() {
        let manifest = briefing();
        let policy = PackagePolicy::new("/p")
            .with_writes(true)
            .with_allowed_tools(Vec::<String>::new());
        assert!(exposed_tools(&manifest, &policy).is_empty());
    }
}
