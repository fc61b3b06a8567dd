//! # Seed Data Generator
//!
//! Populates the database with master data for development.
//!
//! ## Usage
//! ```bash
//! # Generate 500 products (default)
//! cargo run -p tradeflow-db --bin seed
//!
//! # Generate custom amount
//! cargo run -p tradeflow-db --bin seed -- --count 2000
//!
//! # Specify database path
//! cargo run -p tradeflow-db --bin seed -- --db ./data/tradeflow.db
//! ```
//!
//! ## Generated Data
//! - Products across categories, SKU `{CATEGORY}-{ABBR}-{INDEX}`, with an
//!   opening stock movement each
//! - One customer per ten products
//! - A fixed set of suppliers
//! - Credit and debit heads for the accounting module

use chrono::Utc;
use std::env;
use tradeflow_core::{CreditHead, Customer, DebitHead, Product, ProductType, Supplier};
use tradeflow_db::{Database, DbConfig};
use uuid::Uuid;

/// Product categories for realistic test data
const CATEGORIES: &[(&str, &[&str])] = &[
    (
        "HW",
        &[
            "Hex Bolt",
            "Wood Screw",
            "Wall Anchor",
            "Hinge",
            "Door Handle",
            "Padlock",
            "Chain Link",
            "Cable Tie",
            "Washer",
            "Rivet",
        ],
    ),
    (
        "EL",
        &[
            "Copper Cable",
            "Wall Socket",
            "Light Switch",
            "LED Bulb",
            "Fuse",
            "Junction Box",
            "Extension Lead",
            "Circuit Breaker",
            "Plug",
            "Conduit",
        ],
    ),
    (
        "PL",
        &[
            "PVC Pipe",
            "Elbow Joint",
            "Ball Valve",
            "Tap Washer",
            "Sink Trap",
            "Hose Clamp",
            "Flexi Hose",
            "Pipe Tape",
            "Float Valve",
            "Shower Head",
        ],
    ),
    (
        "PT",
        &[
            "Primer",
            "Emulsion",
            "Gloss",
            "Wood Stain",
            "Varnish",
            "Roller",
            "Brush Set",
            "Masking Tape",
            "Thinner",
            "Filler",
        ],
    ),
];

/// Size variants for products
const SIZES: &[(&str, i64)] = &[
    ("Small", 0),
    ("Medium", 150),
    ("Large", 300),
    ("Box of 10", 900),
    ("Box of 50", 4_000),
];

/// Tax rates in basis points
const TAX_RATES: &[u32] = &[0, 500, 1000, 1500];

const SUPPLIERS: &[(&str, &str)] = &[
    ("SUP-NORD", "Nordic Fasteners"),
    ("SUP-VOLT", "Voltline Distribution"),
    ("SUP-AQUA", "Aqua Fittings"),
    ("SUP-HUE", "Hue & Co Paints"),
];

const CREDIT_HEADS: &[&str] = &["Sales Revenue", "Interest", "Other Income"];
const DEBIT_HEADS: &[&str] = &["Rent", "Utilities", "Transport", "Office Supplies"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 500;
    let mut db_path = String::from("./tradeflow_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(500);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Tradeflow Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of products to generate (default: 500)");
                println!("  -d, --db <PATH>    Database file path (default: ./tradeflow_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Tradeflow Seed Data Generator");
    println!("================================");
    println!("Database: {}", db_path);
    println!("Products: {}", count);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let start = std::time::Instant::now();

    // Suppliers and account heads first, they do not depend on anything
    for (code, name) in SUPPLIERS {
        db.suppliers().insert(&generate_supplier(code, name)).await?;
    }
    println!("✓ {} suppliers", SUPPLIERS.len());

    let now = Utc::now();
    for name in CREDIT_HEADS {
        db.accounting()
            .insert_credit_head(&CreditHead {
                id: Uuid::new_v4().to_string(),
                name: name.to_string(),
                description: None,
                is_active: true,
                created_at: now,
            })
            .await?;
    }
    for name in DEBIT_HEADS {
        db.accounting()
            .insert_debit_head(&DebitHead {
                id: Uuid::new_v4().to_string(),
                name: name.to_string(),
                description: None,
                is_active: true,
                created_at: now,
            })
            .await?;
    }
    println!("✓ {} account heads", CREDIT_HEADS.len() + DEBIT_HEADS.len());

    println!();
    println!("Generating products...");

    let mut generated = 0;
    'outer: for (category_idx, (category_code, products)) in CATEGORIES.iter().enumerate() {
        for (product_idx, product_name) in products.iter().enumerate() {
            for (size_idx, (size_name, price_addon)) in SIZES.iter().enumerate() {
                if generated >= count {
                    break 'outer;
                }

                let product = generate_product(
                    category_code,
                    product_name,
                    size_name,
                    *price_addon,
                    category_idx * 1000 + product_idx * 20 + size_idx,
                );

                if let Err(e) = db.products().insert(&product, Some("seed")).await {
                    eprintln!("Failed to insert {}: {}", product.sku, e);
                    continue;
                }

                generated += 1;
                if generated % 100 == 0 {
                    println!("  Generated {} products...", generated);
                }
            }
        }
    }
    println!("✓ {} products", generated);

    let customers = (generated / 10).max(1);
    for n in 0..customers {
        db.customers().insert(&generate_customer(n)).await?;
    }
    println!("✓ {} customers", customers);

    let elapsed = start.elapsed();
    println!();
    println!("✓ Seed complete in {:?}", elapsed);

    let low = db.products().low_stock(Default::default()).await?;
    println!("  {} products at or below their minimum stock", low.total);

    Ok(())
}

/// Generates a single product with realistic data.
fn generate_product(
    category: &str,
    name: &str,
    size: &str,
    price_addon: i64,
    seed: usize,
) -> Product {
    let now = Utc::now();

    let abbr: String = name
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .take(3)
        .collect::<String>()
        .to_uppercase();
    let sku = format!("{}-{}-{:04}", category, abbr, seed);

    // EAN-13 shaped, checksum not valid
    let barcode = Some(format!("590{:010}", seed));

    // Base $1.99 - $29.98 plus size addon
    let price_cents = 199 + ((seed * 37) % 2_800) as i64 + price_addon;
    // Cost is 55-75% of price
    let cost_cents = price_cents * (55 + (seed % 21) as i64) / 100;

    let sales_tax_bps = TAX_RATES[seed % TAX_RATES.len()];

    Product {
        id: Uuid::new_v4().to_string(),
        sku,
        barcode,
        name: format!("{} {}", name, size),
        description: None,
        product_type: ProductType::Standard,
        unit: Some("pcs".to_string()),
        category_id: None,
        price_cents,
        cost_cents,
        sales_tax_bps,
        purchase_tax_bps: sales_tax_bps / 2,
        stock_quantity: (seed % 120) as i64,
        min_stock_level: Some(10),
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

fn generate_supplier(code: &str, name: &str) -> Supplier {
    let now = Utc::now();
    Supplier {
        id: Uuid::new_v4().to_string(),
        code: code.to_string(),
        name: name.to_string(),
        contact_person: None,
        email: Some(format!("orders@{}.example", code.to_lowercase())),
        phone: None,
        address: None,
        city: None,
        country: None,
        tax_id: None,
        payment_terms: Some("NET30".to_string()),
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

fn generate_customer(n: usize) -> Customer {
    let now = Utc::now();
    Customer {
        id: Uuid::new_v4().to_string(),
        name: format!("Customer {:04}", n + 1),
        email: Some(format!("customer{:04}@example.com", n + 1)),
        phone: None,
        company: None,
        address: Some(format!("{} Market Street", n + 1)),
        city: None,
        country: None,
        tax_id: None,
        credit_limit_cents: 500_000,
        outstanding_balance_cents: 0,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}
