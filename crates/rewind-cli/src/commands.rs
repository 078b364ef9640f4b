//! CLI command implementations.

use crate::client::{ChangeFilter, Result, RewindClient};
use rewind_types::{ChangeSummary, RollbackRequest, TagRequest};

/// Renders one change as a log line.
pub fn format_change(change: &ChangeSummary) -> String {
    let short = change.sha.get(..7).unwrap_or(&change.sha);
    format!(
        "{short}  {}  {} <{}>  {}",
        change.timestamp.format("%Y-%m-%d %H:%M:%S"),
        change.author,
        change.email,
        change.message
    )
}

/// Prints the change history.
pub async fn get(client: &RewindClient, filter: &ChangeFilter, json: bool) -> Result<()> {
    tracing::info!(filters = filter.query().len(), "Fetching changes");
    let changes = client.changes(filter).await?;
    if json {
        println!("{}", to_json(&changes));
    } else if changes.is_empty() {
        println!("No matching changes");
    } else {
        for change in &changes {
            println!("{}", format_change(change));
        }
    }
    Ok(())
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

/// Tags a commit.
pub async fn tag_create(
    client: &RewindClient,
    tag: &str,
    sha: &str,
    author: &str,
    email: &str,
) -> Result<()> {
    let mut request = TagRequest::create(tag, sha);
    request.author = Some(author.to_string());
    request.email = Some(email.to_string());
    let reply = client.tag(&request).await?;
    match reply.commit {
        Some(commit) => println!("{} ({commit})", reply.message),
        None => println!("{}", reply.message),
    }
    Ok(())
}

/// Deletes a tag.
pub async fn tag_delete(client: &RewindClient, tag: &str) -> Result<()> {
    let reply = client.tag(&TagRequest::delete(tag)).await?;
    println!("{}", reply.message);
    Ok(())
}

/// Lists tags.
pub async fn tags(client: &RewindClient) -> Result<()> {
    for tag in client.tags().await? {
        println!("{}  {}", tag.sha, tag.tag);
    }
    Ok(())
}

/// Rolls back to a tag or commit.
pub async fn rollback(client: &RewindClient, tag: Option<String>, sha: Option<String>) -> Result<()> {
    let reply = client.rollback(&RollbackRequest { tag, sha }).await?;
    match reply.commit {
        Some(commit) => println!("{}\nRollback commit: {commit}", reply.message),
        None => println!("{}", reply.message),
    }
    Ok(())
}

/// Clears a failed rollback.
pub async fn recover(client: &RewindClient) -> Result<()> {
    let reply = client.recover().await?;
    println!("{}", reply.message);
    Ok(())
}
