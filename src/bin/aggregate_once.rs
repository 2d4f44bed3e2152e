//! Run one aggregation against the live upstreams and print the JSON response.
//!
//! Usage: aggregate_once <topicId> [--national] [--topic-feeds]

use sports_news_aggregator::{aggregator_from_env, init_tracing, AggregateRequest};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let mut req = AggregateRequest::default();
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--national" => req.include_national = true,
            "--topic-feeds" => req.include_topic_feeds = true,
            "-h" | "--help" => {
                println!("usage: aggregate_once <topicId> [--national] [--topic-feeds]");
                return Ok(());
            }
            flag if flag.starts_with("--") => anyhow::bail!("unknown flag {flag}"),
            topic => req.topic_id = Some(topic.to_string()),
        }
    }

    let aggregator = aggregator_from_env()?;
    let result = aggregator.aggregate(&req).await;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
