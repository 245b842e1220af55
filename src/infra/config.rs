//! Centralized configuration (environment variables + defaults).

/// Solana RPC URL (required).
pub fn solana_rpc_url() -> String {
    std::env::var("SOLANA_RPC_URL").expect("SOLANA_RPC_URL must be set")
}

/// Product registry program id (required).
///
/// Set this to the Program ID you deployed (e.g. output of `anchor deploy`).
pub fn solana_program_id() -> String {
    std::env::var("SOLANA_PROGRAM_ID").expect("SOLANA_PROGRAM_ID must be set")
}

/// Network moniker the wallet reports (defaults to devnet).
pub fn solana_network() -> String {
    std::env::var("SOLANA_NETWORK").unwrap_or_else(|_| "devnet".to_string())
}

/// Path to the wallet keypair file (tilde-expanded).
pub fn wallet_keypair_path() -> String {
    let raw = std::env::var("WALLET_KEYPAIR_PATH")
        .unwrap_or_else(|_| "~/.config/solana/id.json".to_string());
    shellexpand::tilde(&raw).to_string()
}

/// Database URL must be provided (no default) for safety.
pub fn database_url() -> String {
    std::env::var("DATABASE_URL").expect("DATABASE_URL must be set")
}

/// Base URL of the backend index API (defaults to the local server).
pub fn backend_api_url() -> String {
    std::env::var("BACKEND_API_URL").unwrap_or_else(|_| "http://localhost:4000".to_string())
}

/// Bind address for the backend index API server.
pub fn bind_addr() -> String {
    std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:4000".to_string())
}
