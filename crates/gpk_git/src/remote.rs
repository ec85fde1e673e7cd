use std::collections::BTreeMap;

use camino::Utf8Path;
use tracing::debug;

use crate::cmd::{GitError, git};

/// One entry of the remote tag view. Annotated tags carry the OID of the tag
/// object itself next to the commit it points at; lightweight tags only have
/// the commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRef {
    pub annotated: Option<String>,
    pub commit: String,
}

/// Remote branch tips plus the branch HEAD points at.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RemoteRefs {
    pub branches: BTreeMap<String, String>,
    pub head: Option<String>,
}

/// Lists the tags of a remote, merging peeled (`^{}`) entries into their tag.
pub fn list_tags(url: &str) -> Result<BTreeMap<String, TagRef>, GitError> {
    debug!("listing tags of {url}");
    let output = git("ls-remote", &["ls-remote", "--tags", url], None)?;
    Ok(parse_tag_listing(&output))
}

/// Lists the branch tips of a remote and resolves which branch HEAD names.
pub fn list_branches(url: &str) -> Result<RemoteRefs, GitError> {
    debug!("listing branches of {url}");
    let output = git("ls-remote", &["ls-remote", "--symref", url], None)?;
    Ok(parse_branch_listing(&output))
}

/// Shallow clone at a single ref (tag or branch name).
pub fn clone_ref(reference: &str, url: &str, dst: &Utf8Path) -> Result<(), GitError> {
    debug!("cloning {url} at {reference} into {dst}");
    git(
        "clone",
        &[
            "clone",
            "--depth",
            "1",
            "--branch",
            reference,
            url,
            dst.as_str(),
        ],
        None,
    )?;
    Ok(())
}

/// Clone and detach at a commit SHA. `--branch` does not accept a SHA, so
/// this is a full clone followed by a checkout.
pub fn clone_commit(url: &str, commit: &str, dst: &Utf8Path) -> Result<(), GitError> {
    debug!("cloning {url} at commit {commit} into {dst}");
    git("clone", &["clone", url, dst.as_str()], None)?;
    git(
        "checkout",
        &["checkout", "--detach", commit],
        Some(dst),
    )?;
    Ok(())
}

fn parse_tag_listing(output: &str) -> BTreeMap<String, TagRef> {
    let mut tags: BTreeMap<String, TagRef> = BTreeMap::new();
    for (oid, refname) in ref_lines(output) {
        let Some(tag) = refname.strip_prefix("refs/tags/") else {
            continue;
        };
        if let Some(tag) = tag.strip_suffix("^{}") {
            // Peeled entry: the OID is the commit the annotated tag points
            // at; the plain entry already recorded the tag object OID.
            let entry = tags.entry(tag.to_string()).or_insert_with(|| TagRef {
                annotated: None,
                commit: String::new(),
            });
            if entry.annotated.is_none() && !entry.commit.is_empty() {
                entry.annotated = Some(std::mem::take(&mut entry.commit));
            }
            entry.commit = oid.to_string();
        } else {
            let entry = tags.entry(tag.to_string()).or_insert_with(|| TagRef {
                annotated: None,
                commit: String::new(),
            });
            if entry.commit.is_empty() {
                entry.commit = oid.to_string();
            } else {
                // Peeled line arrived first; this OID is the tag object.
                entry.annotated = Some(oid.to_string());
            }
        }
    }
    tags
}

fn parse_branch_listing(output: &str) -> RemoteRefs {
    let mut refs = RemoteRefs::default();
    for line in output.lines() {
        if let Some(rest) = line.strip_prefix("ref: ") {
            if let Some((target, "HEAD")) = split_ref_line(rest) {
                refs.head = target.strip_prefix("refs/heads/").map(str::to_string);
            }
            continue;
        }
        if let Some((oid, refname)) = split_ref_line(line)
            && let Some(branch) = refname.strip_prefix("refs/heads/")
        {
            refs.branches.insert(branch.to_string(), oid.to_string());
        }
    }
    refs
}

fn ref_lines(output: &str) -> impl Iterator<Item = (&str, &str)> {
    output.lines().filter_map(split_ref_line)
}

fn split_ref_line(line: &str) -> Option<(&str, &str)> {
    let (left, right) = line.split_once('\t')?;
    (!left.is_empty() && !right.is_empty()).then_some((left, right))
}
