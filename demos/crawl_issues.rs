use ghcrawler_http::{FetchOverrides, GitHubFetcher};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let repo = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "rust-lang/rust".to_owned());

    let overrides = FetchOverrides::from_env().map_err(anyhow::Error::msg)?;
    let fetcher = GitHubFetcher::new(overrides);

    let info = fetcher
        .get(&format!("https://api.github.com/repos/{repo}"))
        .await?;
    println!("{repo}: {} open issues", info["open_issues_count"]);

    let labels = fetcher
        .get_all(&format!("https://api.github.com/repos/{repo}/labels"))
        .await?;
    for label in &labels {
        println!("{}", label["name"]);
    }

    for record in fetcher.activity() {
        println!("{}", serde_json::to_string(&record)?);
    }

    Ok(())
}
