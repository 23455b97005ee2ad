use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "minichain-cli")]
#[command(about = "CLI client for the minichain node")]
struct Cli {
    /// Node base URL (e.g. http://127.0.0.1:8080)
    #[arg(long, global = true, default_value = "http://127.0.0.1:8080")]
    node: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit a transaction to the pending queue
    Submit {
        /// Sender
        #[arg(long)]
        from: String,
        /// Recipient
        #[arg(long)]
        to: String,
        /// Amount
        #[arg(long)]
        amount: u64,
    },
    /// Mine the pending transactions into a new block
    Mine {
        /// Address that receives the mining reward
        #[arg(long)]
        address: String,
    },
    /// Look up the balance of an address
    Balance { address: String },
    /// Show the chain tip
    Head,
    /// Run the chain integrity check
    Validate,
    /// Dump the whole chain
    Chain,
}

#[derive(Serialize)]
struct Tx {
    sender: String,
    recipient: String,
    amount: u64,
}

async fn print_response(res: reqwest::Response) -> Result<()> {
    let status = res.status();
    let body = res.text().await?;
    println!("status: {}", status);
    println!("{body}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .pretty()
        .init();

    let cli = Cli::parse();
    let node = cli.node;
    let client = reqwest::Client::new();
    let res = match cli.cmd {
        Command::Submit { from, to, amount } => {
            let tx = Tx {
                sender: from,
                recipient: to,
                amount,
            };
            client.post(format!("{node}/tx")).json(&tx).send().await?
        }
        Command::Mine { address } => {
            client
                .post(format!("{node}/mine"))
                .json(&json!({ "reward_address": address }))
                .send()
                .await?
        }
        Command::Balance { address } => {
            client
                .get(format!("{node}/balance/{address}"))
                .send()
                .await?
        }
        Command::Head => client.get(format!("{node}/chain/head")).send().await?,
        Command::Validate => client.get(format!("{node}/validate")).send().await?,
        Command::Chain => client.get(format!("{node}/chain")).send().await?,
    };
    print_response(res).await
}
