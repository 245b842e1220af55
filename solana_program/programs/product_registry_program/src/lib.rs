// Solana smart contract for the product registry.
use anchor_lang::prelude::*;

declare_id!("GBVa2SfUvKcfii48uFut9C5QyLWoDX5uwrcyqJX9qszM");

// String fields are length-prefixed; these caps bound the account space.
const MAX_SKU_LEN: usize = 64;
const MAX_NOTE_LEN: usize = 256;

#[program]
pub mod product_registry_program {
    use super::*;

    pub fn initialize(ctx: Context<Initialize>) -> Result<()> {
        let state = &mut ctx.accounts.registry_state;
        state.next_product_id = 1;
        Ok(())
    }

    pub fn add_product(ctx: Context<AddProduct>, sku: String, initial_hash: [u8; 32]) -> Result<()> {
        require!(sku.len() <= MAX_SKU_LEN, RegistryError::SkuTooLong);

        let state = &mut ctx.accounts.registry_state;
        let product = &mut ctx.accounts.product;

        product.id = state.next_product_id;
        product.vendor = ctx.accounts.vendor.key();
        product.sku = sku;
        product.initial_hash = initial_hash;
        product.created_at = Clock::get()?.unix_timestamp;
        product.updates_count = 0;

        // First registration for a hash wins the index slot; later entries
        // with the same hash still land on the ledger.
        let hash_index = &mut ctx.accounts.hash_index;
        if hash_index.product_id == 0 {
            hash_index.product_id = product.id;
        }

        state.next_product_id += 1;
        Ok(())
    }

    pub fn add_update(ctx: Context<AddUpdate>, metadata_hash: [u8; 32], note: String) -> Result<()> {
        require!(note.len() <= MAX_NOTE_LEN, RegistryError::NoteTooLong);

        let product = &mut ctx.accounts.product;
        let update = &mut ctx.accounts.update;

        update.timestamp = Clock::get()?.unix_timestamp;
        update.metadata_hash = metadata_hash;
        update.updater = ctx.accounts.updater.key();
        update.note = note;

        product.updates_count += 1;
        Ok(())
    }
}

#[derive(Accounts)]
pub struct Initialize<'info> {
    #[account(
        init_if_needed,
        payer = user,
        space = 8 + 8,
        seeds = [b"registry_state"],
        bump
    )]
    pub registry_state: Account<'info, RegistryState>,
    #[account(mut)]
    pub user: Signer<'info>,
    pub system_program: Program<'info, System>,
}

#[derive(Accounts)]
#[instruction(sku: String, initial_hash: [u8; 32])]
pub struct AddProduct<'info> {
    #[account(mut, seeds = [b"registry_state"], bump)]
    pub registry_state: Account<'info, RegistryState>,
    #[account(
        init,
        payer = vendor,
        space = 8 + 8 + 32 + (4 + MAX_SKU_LEN) + 32 + 8 + 8,
        seeds = [b"product", registry_state.next_product_id.to_le_bytes().as_ref()],
        bump
    )]
    pub product: Account<'info, Product>,
    #[account(
        init_if_needed,
        payer = vendor,
        space = 8 + 8,
        seeds = [b"product_hash", initial_hash.as_ref()],
        bump
    )]
    pub hash_index: Account<'info, HashIndex>,
    #[account(mut)]
    pub vendor: Signer<'info>,
    pub system_program: Program<'info, System>,
}

#[derive(Accounts)]
pub struct AddUpdate<'info> {
    #[account(mut)]
    pub product: Account<'info, Product>,
    #[account(
        init,
        payer = updater,
        space = 8 + 8 + 32 + 32 + (4 + MAX_NOTE_LEN),
        seeds = [b"product_update", product.id.to_le_bytes().as_ref(), product.updates_count.to_le_bytes().as_ref()],
        bump
    )]
    pub update: Account<'info, ProductUpdate>,
    #[account(mut)]
    pub updater: Signer<'info>,
    pub system_program: Program<'info, System>,
}

#[account]
pub struct RegistryState {
    pub next_product_id: u64,
}

#[account]
pub struct Product {
    pub id: u64,
    pub vendor: Pubkey,
    pub sku: String,
    pub initial_hash: [u8; 32],
    pub created_at: i64,
    pub updates_count: u64,
}

#[account]
pub struct ProductUpdate {
    pub timestamp: i64,
    pub metadata_hash: [u8; 32],
    pub updater: Pubkey,
    pub note: String,
}

#[account]
pub struct HashIndex {
    pub product_id: u64,
}

#[error_code]
pub enum RegistryError {
    #[msg("SKU exceeds the maximum length")]
    SkuTooLong,
    #[msg("Update note exceeds the maximum length")]
    NoteTooLong,
}
