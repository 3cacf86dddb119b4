use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::net::IpAddr;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpStream, UdpSocket};

use geossh::ingest::PayloadGrammar;

#[derive(Clone, Copy, ValueEnum)]
enum Transport {
    Tcp,
    Udp,
}

#[derive(Parser)]
#[command(name = "geossh-notify")]
#[command(about = "Send one SSH login notification to a geossh collector", long_about = None)]
struct Cli {
    /// Login name of the session
    username: String,
    /// Remote address the login came from
    address: IpAddr,
    /// Remote port the login came from
    port: u16,
    /// Collector address
    #[arg(long, default_value = "127.0.0.1:7070")]
    collector: String,
    #[arg(long, value_enum, default_value = "udp")]
    transport: Transport,
    /// Token delimiter, whitespace when omitted
    #[arg(long)]
    delimiter: Option<char>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let grammar = match cli.delimiter {
        Some(d) => PayloadGrammar::delimited(d),
        None => PayloadGrammar::whitespace(),
    };
    let line = grammar.format(&cli.username, &cli.address.to_string(), cli.port);
    // Parse our own line so an unusable username is caught here
    grammar
        .parse(line.as_bytes())
        .context("notification would be rejected by the collector")?;

    match cli.transport {
        Transport::Tcp => {
            let mut stream = TcpStream::connect(&cli.collector)
                .await
                .with_context(|| format!("failed to connect to {}", cli.collector))?;
            stream.write_all(line.as_bytes()).await?;
            stream.shutdown().await?;
        }
        Transport::Udp => {
            let socket = UdpSocket::bind(if cli.collector.starts_with('[') {
                "[::]:0"
            } else {
                "0.0.0.0:0"
            })
            .await?;
            socket
                .send_to(line.as_bytes(), &cli.collector)
                .await
                .with_context(|| format!("failed to send to {}", cli.collector))?;
        }
    }

    println!("✅ Sent '{}' to {}", line, cli.collector);
    Ok(())
}
