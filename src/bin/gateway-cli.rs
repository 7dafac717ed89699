use clap::{Args, Parser, Subcommand};
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Command-line client for the ledger gateway API", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Transaction {
    #[arg(long)]
    channel: String,
    #[arg(long)]
    ccid: String,
    /// Chaincode function name
    #[arg(long = "fn")]
    method: String,
    #[arg(long)]
    org: String,
    #[arg(long)]
    invoker_role: String,
    /// Positional chaincode arguments; values that parse as JSON are sent as JSON
    args: Vec<String>,
}

#[derive(Args)]
struct Caller {
    #[arg(long)]
    org: String,
    #[arg(long)]
    user_id: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a chaincode transaction
    Invoke(Transaction),
    /// Evaluate a chaincode query
    Query(Transaction),
    /// Force ledger client initialization
    Init,
    /// List joined channels
    Channels(Caller),
    /// List installed chaincodes
    Installed(Caller),
    /// List chaincodes instantiated on a channel
    Instantiated {
        #[command(flatten)]
        caller: Caller,
        #[arg(long)]
        channel_id: String,
    },
    /// Fetch a block by number
    Block {
        #[command(flatten)]
        caller: Caller,
        #[arg(long)]
        channel_id: String,
        #[arg(long)]
        block_num: u64,
    },
    /// Fetch a transaction by id
    Trxn {
        #[command(flatten)]
        caller: Caller,
        #[arg(long)]
        channel_id: String,
        #[arg(long)]
        trxn_id: String,
    },
    /// Check gateway liveness
    Health,
}

impl Transaction {
    fn body(&self) -> Value {
        let args: Vec<Value> = self
            .args
            .iter()
            .map(|a| serde_json::from_str(a).unwrap_or_else(|_| Value::String(a.clone())))
            .collect();
        json!({
            "channel": self.channel,
            "ccid": self.ccid,
            "fn": self.method,
            "org": self.org,
            "invokerRole": self.invoker_role,
            "args": args,
        })
    }
}

impl Caller {
    fn params(&self) -> Vec<(&'static str, String)> {
        vec![("org", self.org.clone()), ("userId", self.user_id.clone())]
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = Client::new();
    let base = cli.url.trim_end_matches('/');

    let request: RequestBuilder = match cli.command {
        Commands::Invoke(tx) => client.post(format!("{base}/invoke")).json(&tx.body()),
        Commands::Query(tx) => client.post(format!("{base}/query")).json(&tx.body()),
        Commands::Init => client.put(format!("{base}/init")),
        Commands::Channels(caller) => client.get(format!("{base}/channels")).query(&caller.params()),
        Commands::Installed(caller) => client
            .get(format!("{base}/chaincodes/installed"))
            .query(&caller.params()),
        Commands::Instantiated { caller, channel_id } => {
            let mut params = caller.params();
            params.push(("channelId", channel_id));
            client.get(format!("{base}/chaincodes/instantiated")).query(&params)
        }
        Commands::Block { caller, channel_id, block_num } => {
            let mut params = caller.params();
            params.push(("channelId", channel_id));
            params.push(("blockNum", block_num.to_string()));
            client.get(format!("{base}/block")).query(&params)
        }
        Commands::Trxn { caller, channel_id, trxn_id } => {
            let mut params = caller.params();
            params.push(("channelId", channel_id));
            params.push(("trxnId", trxn_id));
            client.get(format!("{base}/trxn")).query(&params)
        }
        Commands::Health => client.get(format!("{base}/health")),
    };

    print_response(request.send().await?).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    let rendered = match serde_json::from_str::<Value>(&text) {
        Ok(json) => serde_json::to_string_pretty(&json)?,
        Err(_) => text,
    };
    if status.is_success() {
        println!("{rendered}");
    } else {
        eprintln!("Error: gateway returned status {status}");
        eprintln!("{rendered}");
        std::process::exit(1);
    }
    Ok(())
}
