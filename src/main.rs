//! course-rag 命令行入口
//!
//! 有参数时把参数拼成一个问题回答后退出；否则从 stdin 逐行读取问题，所有问题共用一个会话。
//! 配置文件路径可用 COURSE_RAG_CONFIG 指定。

use std::path::PathBuf;

use anyhow::Context;
use course_rag::{config::load_config, observability, QueryResponse, RagSystem};
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let config_path = std::env::var_os("COURSE_RAG_CONFIG").map(PathBuf::from);
    let cfg = load_config(config_path).context("Failed to load config")?;
    let rag = RagSystem::from_config(&cfg)
        .await
        .context("Failed to build rag system")?;

    let question = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if !question.trim().is_empty() {
        let response = rag.query(&question, None).await;
        print_response(&response);
        return Ok(());
    }

    let analytics = rag.course_analytics().await;
    let name = cfg.app.name.as_deref().unwrap_or("course-rag");
    println!(
        "{name}: {} course(s) loaded. Ask a question, empty line to quit.",
        analytics.total_courses
    );

    let session_id = rag.memory().create_session();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        let response = rag.query(line, Some(&session_id)).await;
        print_response(&response);
    }

    Ok(())
}

fn print_response(response: &QueryResponse) {
    println!("{}", response.answer);
    if !response.sources.is_empty() {
        println!("\nSources:");
        for source in &response.sources {
            match &source.link {
                Some(link) => println!("  - {} ({link})", source.text),
                None => println!("  - {}", source.text),
            }
        }
    }
    println!();
}
