use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::commitment_config::CommitmentConfig;
use std::sync::Arc;
use vibechain::infra::config;
use vibechain::{KeypairWallet, SolanaRegistry, WalletSession};

fn usage_and_exit() -> ! {
    eprintln!(
        "Usage: cargo run --bin preflight -- [--init-state-if-missing]\n\
         \n\
         Requires env vars:\n\
           SOLANA_RPC_URL, SOLANA_PROGRAM_ID\n\
         Optional env vars:\n\
           BACKEND_API_URL, WALLET_KEYPAIR_PATH (default ~/.config/solana/id.json)\n"
    );
    std::process::exit(2);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "-h" || a == "--help") {
        usage_and_exit();
    }

    let init_state_if_missing = args.iter().any(|a| a == "--init-state-if-missing");

    // Force-read config (nice error messages if missing)
    let rpc_url = config::solana_rpc_url();
    let program_id_str = config::solana_program_id();

    println!("> Preflight:");
    println!("  SOLANA_RPC_URL={}", rpc_url);
    println!("  SOLANA_PROGRAM_ID={}", program_id_str);

    // Same wallet the workflows use.
    let wallet = KeypairWallet::from_env().map_err(|e| anyhow::anyhow!("{}", e))?;
    let session = WalletSession::connect(Arc::new(wallet))
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    let client = RpcClient::new_with_commitment(rpc_url, CommitmentConfig::confirmed());

    // Basic RPC connectivity
    let version = client.get_version().await?;
    println!("  RPC version: {}", version.solana_core);

    // Payer balance
    let balance_lamports = client.get_balance(&session.address()).await?;
    let sol = balance_lamports as f64 / 1_000_000_000_f64;
    println!("  Payer: {}", session.address());
    println!("  Payer balance: {} lamports (~{:.6} SOL)", balance_lamports, sol);
    if balance_lamports < 10_000_000 {
        eprintln!("  Warning: payer balance looks low; devnet transactions may fail.");
    }

    // Program account existence
    let registry = SolanaRegistry::from_env()?;
    let program_acct = client
        .get_account(&registry.program_id())
        .await
        .map_err(|e| {
            anyhow::anyhow!(
                "Program account not found on cluster: {} ({})",
                registry.program_id(),
                e
            )
        })?;
    if !program_acct.executable {
        eprintln!("  Warning: program account exists but is not marked executable.");
    } else {
        println!("  Program account is deployed + executable.");
    }

    // Registry state PDA existence
    let state = registry.registry_state_pubkey();
    println!("  Registry state PDA: {}", state);

    let state_exists = client.get_account(&state).await.is_ok();
    if state_exists {
        println!("  Registry state account exists.");
    } else if init_state_if_missing {
        println!("  Registry state missing -> initializing on-chain...");
        registry
            .initialize(&session)
            .await
            .map_err(|e| anyhow::anyhow!("{}", e))?;
        client
            .get_account(&state)
            .await
            .map_err(|e| anyhow::anyhow!("Registry state still missing after initialize: {}", e))?;
        println!("  Registry state initialized successfully.");
    } else {
        return Err(anyhow::anyhow!(
            "Registry state account does not exist. Re-run with --init-state-if-missing"
        ));
    }

    // Backend index reachability (optional)
    if std::env::var("BACKEND_API_URL").is_ok() {
        let backend = config::backend_api_url();
        let resp = reqwest::get(format!("{}/health", backend.trim_end_matches('/'))).await;
        match resp {
            Ok(r) if r.status().is_success() => println!("  Backend index is healthy ({}).", backend),
            Ok(r) => eprintln!("  Warning: backend index returned {} ({}).", r.status(), backend),
            Err(e) => eprintln!("  Warning: backend index unreachable ({}): {}", backend, e),
        }
    }

    println!("> Preflight OK.");
    Ok(())
}
