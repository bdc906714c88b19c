//! # Seed Data Generator
//!
//! Populates a development database with branches, a small pharmacy
//! catalog, branch stock, one running campaign and one voucher.
//!
//! ## Usage
//! ```bash
//! # Seed ./pharmacy_dev.db
//! cargo run -p pharmacy-db --bin seed
//!
//! # Specify database path
//! cargo run -p pharmacy-db --bin seed -- --db ./data/pharmacy.db
//! ```
//!
//! Every product is sold by box (`Hộp`) and by blister strip (`Vỉ`, a tenth
//! of the box price). Stock is counted in strips and spread so that at least
//! one product is low at each branch, which makes the cart clamp easy to try
//! by hand.

use anyhow::Context;
use chrono::{Duration, Utc};
use std::env;
use uuid::Uuid;

use pharmacy_core::promotion::PromotionCampaign;
use pharmacy_core::voucher::{Voucher, VoucherKind};
use pharmacy_core::{Money, Percent, Product, UnitDefinition};
use pharmacy_db::{Database, DbConfig};

const BRANCHES: &[(&str, &str, &str)] = &[
    ("CN01", "Chi nhánh Quận 1", "12 Lê Lợi, Quận 1"),
    ("CN02", "Chi nhánh Quận 3", "5 Võ Văn Tần, Quận 3"),
    ("CN03", "Chi nhánh Thủ Đức", "88 Võ Văn Ngân, Thủ Đức"),
];

/// (code, name, box price in đồng)
const PRODUCTS: &[(&str, &str, i64)] = &[
    ("PARA-500", "Paracetamol 500mg", 100_000),
    ("AMOX-500", "Amoxicillin 500mg", 120_000),
    ("VITC-1000", "Vitamin C 1000mg", 80_000),
    ("IBU-400", "Ibuprofen 400mg", 95_000),
    ("LORA-10", "Loratadine 10mg", 60_000),
    ("OMEP-20", "Omeprazole 20mg", 140_000),
    ("ORS-245", "Oresol 245", 30_000),
    ("BERB-100", "Berberin 100mg", 25_000),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    let mut db_path = "./pharmacy_dev.db".to_string();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Pharmacy Commerce Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./pharmacy_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            other => {
                eprintln!("Ignoring unknown argument: {other}");
            }
        }
        i += 1;
    }

    println!("🌱 Pharmacy Commerce Seed Data Generator");
    println!("=======================================");
    println!("Database: {db_path}");
    println!();

    let db = Database::new(DbConfig::new(&db_path))
        .await
        .context("opening database")?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {existing} products");
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    for (code, name, address) in BRANCHES {
        db.stock()
            .insert_branch(code, name, address)
            .await
            .with_context(|| format!("inserting branch {code}"))?;
    }
    println!("✓ {} branches", BRANCHES.len());

    let mut ids = Vec::with_capacity(PRODUCTS.len());
    for (index, (code, name, price)) in PRODUCTS.iter().enumerate() {
        let product = Product {
            id: Uuid::new_v4().to_string(),
            code: code.to_string(),
            name: name.to_string(),
            units: vec![
                UnitDefinition {
                    unit_label: "Hộp".to_string(),
                    quantity_per_unit: 10,
                    price: Money::from_minor(*price),
                },
                UnitDefinition {
                    unit_label: "Vỉ".to_string(),
                    quantity_per_unit: 1,
                    price: Money::from_minor(price / 10),
                },
            ],
            campaign_code: None,
            is_active: true,
        };
        db.products()
            .insert(&product)
            .await
            .with_context(|| format!("inserting product {code}"))?;

        for (branch_index, (branch, _, _)) in BRANCHES.iter().enumerate() {
            // Deterministic spread: 2..=41 strips, one low product per branch
            let quantity = ((index * 7 + branch_index * 13) % 40 + 2) as i64;
            db.stock().set_quantity(branch, code, quantity).await?;
        }
        ids.push(product.id);
    }
    println!("✓ {} products with stock at every branch", PRODUCTS.len());

    let today = Utc::now().date_naive();
    let campaign = PromotionCampaign {
        code: "KM-HE".to_string(),
        name: "Khuyến mãi mùa hè".to_string(),
        percent: Percent::new(20)?,
        unit_label: None,
        starts_on: today,
        ends_on: today + Duration::days(30),
    };
    db.promotions().create(&campaign).await?;
    db.promotions()
        .apply_to_products(&campaign.code, &ids[..2])
        .await?;
    println!("✓ Campaign {} ({}) on 2 products", campaign.code, campaign.percent);

    let voucher = Voucher {
        code: "GIAM50K".to_string(),
        kind: VoucherKind::Fixed(Money::from_minor(50_000)),
        remaining: 100,
        expires_on: today + Duration::days(60),
    };
    db.vouchers().create(&voucher).await?;
    println!("✓ Voucher {} ({} uses)", voucher.code, voucher.remaining);

    println!();
    println!("✓ Seed complete!");
    Ok(())
}
