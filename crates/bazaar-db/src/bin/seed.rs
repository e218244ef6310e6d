//! # Seed Data Generator
//!
//! Populates the database with a demo storefront for development.
//!
//! ## Usage
//! ```bash
//! # Generate 40 products (default)
//! cargo run -p bazaar-db --bin seed
//!
//! # Generate custom amount
//! cargo run -p bazaar-db --bin seed -- --products 200
//!
//! # Specify database path (otherwise BAZAAR_DB_PATH, then ./bazaar_dev.db)
//! cargo run -p bazaar-db --bin seed -- --db ./data/bazaar.db
//! ```
//!
//! ## Generated Data
//! - One category per garment family
//! - Products with a price between $9.99 and $89.98 and a 0-30% discount
//! - Three colors and four sizes per product, each cell stocked 0-25
//! - One or two images per product (the first is primary)
//! - A demo shopper with a default shipping address

use bazaar_core::{AddressFields, InventoryKey, NewProduct};
use bazaar_db::{config, ConfigError, Database};
use std::env;
use tracing_subscriber::EnvFilter;

/// Garment families and the product names generated for each.
const CATEGORIES: &[(&str, &[&str])] = &[
    (
        "Shirts",
        &["Oxford Shirt", "Linen Shirt", "Flannel Shirt", "Denim Shirt", "Polo"],
    ),
    (
        "Trousers",
        &["Chinos", "Slim Jeans", "Cargo Pants", "Linen Trousers", "Joggers"],
    ),
    (
        "Outerwear",
        &["Rain Jacket", "Wool Coat", "Bomber Jacket", "Puffer Vest", "Parka"],
    ),
    (
        "Footwear",
        &["Runner", "Canvas Sneaker", "Chelsea Boot", "Loafer", "Sandal"],
    ),
];

const COLORS: &[(&str, &str)] = &[
    ("Black", "#000000"),
    ("Navy", "#1F2A44"),
    ("Sand", "#C2B280"),
    ("Olive", "#708238"),
    ("White", "#FFFFFF"),
];

const SIZES: &[&str] = &["S", "M", "L", "XL"];

/// Discounts in basis points
const DISCOUNTS: &[u32] = &[0, 0, 1_000, 1_500, 2_000, 3_000];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    // Parse command line arguments
    let args: Vec<String> = env::args().skip(1).collect();
    let Some(SeedArgs { count, db_path }) = parse_args(&args)? else {
        print_help();
        return Ok(());
    };

    let mut config = config::load_from_env()?;
    if let Some(path) = db_path {
        config.database_path = path.into();
    } else if env::var("BAZAAR_DB_PATH").is_err() {
        config.database_path = "./bazaar_dev.db".into();
    }

    println!("🌱 Bazaar Seed Data Generator");
    println!("=============================");
    println!("Database: {}", config.database_path.display());
    println!("Products: {}", count);
    println!();

    let db = Database::new(config).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    // Check existing products
    let existing = db.catalog().count_products().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    println!();
    println!("Generating catalog...");

    let start = std::time::Instant::now();
    let mut generated = 0;
    let mut cells = 0;

    let per_category = count.div_ceil(CATEGORIES.len());

    for (category_name, names) in CATEGORIES {
        if generated >= count {
            break;
        }
        let category = db.catalog().create_category(category_name, None).await?;

        for slot in 0..per_category {
            if generated >= count {
                break;
            }

            let seed = generated;
            let name = names[slot % names.len()];
            let round = slot / names.len();
            let full_name = if round == 0 {
                name.to_string()
            } else {
                format!("{} {}", name, round + 1)
            };

            let product = db
                .catalog()
                .create_product(&NewProduct {
                    name: full_name,
                    description: Some(format!("{} from the {} range", name, category_name)),
                    category_id: Some(category.id),
                    base_price_cents: 999 + ((seed * 1_337) % 8_000) as i64,
                    discount_bps: DISCOUNTS[seed % DISCOUNTS.len()],
                    featured: seed % 7 == 0,
                })
                .await?;

            let mut colors = Vec::new();
            for offset in 0..3 {
                let (color_name, hex) = COLORS[(seed + offset) % COLORS.len()];
                colors.push(db.catalog().add_color(product.id, color_name, Some(hex)).await?);
            }

            let mut sizes = Vec::new();
            for size_name in SIZES {
                sizes.push(db.catalog().add_size(product.id, size_name).await?);
            }

            for color in &colors {
                for size in &sizes {
                    let key = InventoryKey::new(product.id, color.id, size.id);
                    let stock = (seed as i64 + color.id * 7 + size.id * 3) % 26;
                    db.inventory().adjust(key, stock).await?;
                    cells += 1;
                }
            }

            let slug = name.to_lowercase().replace(' ', "-");
            db.images()
                .create(product.id, &format!("https://cdn.bazaar.test/{slug}/{seed}-front.jpg"), false)
                .await?;
            if seed % 2 == 0 {
                db.images()
                    .create(product.id, &format!("https://cdn.bazaar.test/{slug}/{seed}-back.jpg"), false)
                    .await?;
            }

            generated += 1;
            if generated % 20 == 0 {
                println!("  Generated {} products...", generated);
            }
        }
    }

    let elapsed = start.elapsed();
    println!();
    println!("✓ Generated {} products ({} inventory cells) in {:?}", generated, cells, elapsed);

    // Demo shopper
    let shopper = db.catalog().create_user("Demo Shopper", "demo@bazaar.test").await?;
    let address = db
        .addresses()
        .create(
            shopper.id,
            &AddressFields {
                name: "Demo Shopper".to_string(),
                street: "1 Market Street".to_string(),
                city: "Springfield".to_string(),
                state: "IL".to_string(),
                postal_code: "62701".to_string(),
                country: "US".to_string(),
                phone: "+1 217 555 0100".to_string(),
            },
            true,
        )
        .await?;

    println!("✓ Created demo user {} (default address {})", shopper.email, address.id);
    println!();
    println!("✓ Seed complete!");

    db.close().await;
    Ok(())
}

/// Options accepted on the command line.
#[derive(Debug, PartialEq, Eq)]
struct SeedArgs {
    count: usize,
    db_path: Option<String>,
}

/// Parses the arguments after the program name. `Ok(None)` means help was
/// requested.
fn parse_args(args: &[String]) -> Result<Option<SeedArgs>, ConfigError> {
    let mut parsed = SeedArgs {
        count: 40,
        db_path: None,
    };

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--products" | "-p" => {
                let value = iter
                    .next()
                    .ok_or_else(|| ConfigError::MissingRequired("--products <N>".to_string()))?;
                parsed.count = value
                    .parse()
                    .ok()
                    .filter(|n: &usize| *n > 0)
                    .ok_or_else(|| {
                        ConfigError::InvalidValue(format!("--products ({value:?} is not a positive integer)"))
                    })?;
            }
            "--db" | "-d" => {
                let value = iter
                    .next()
                    .ok_or_else(|| ConfigError::MissingRequired("--db <PATH>".to_string()))?;
                parsed.db_path = Some(value.clone());
            }
            "--help" | "-h" => return Ok(None),
            _ => {}
        }
    }

    Ok(Some(parsed))
}

fn print_help() {
    println!("Bazaar Seed Data Generator");
    println!();
    println!("Usage: seed [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -p, --products <N>  Number of products to generate (default: 40)");
    println!("  -d, --db <PATH>     Database file path (default: $BAZAAR_DB_PATH or ./bazaar_dev.db)");
    println!("  -h, --help          Show this help message");
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,bazaar_db=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_defaults() {
        let parsed = parse_args(&[]).unwrap().unwrap();
        assert_eq!(parsed, SeedArgs { count: 40, db_path: None });
    }

    #[test]
    fn test_products_and_db() {
        let parsed = parse_args(&args(&["-p", "200", "--db", "./data/bazaar.db"]))
            .unwrap()
            .unwrap();
        assert_eq!(parsed.count, 200);
        assert_eq!(parsed.db_path.as_deref(), Some("./data/bazaar.db"));
    }

    #[test]
    fn test_malformed_products_is_an_error() {
        for bad in ["abc", "-5", "0", "12x"] {
            let err = parse_args(&args(&["--products", bad])).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidValue(_)), "{bad}");
        }

        let err = parse_args(&args(&["--products"])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired(_)));
    }

    #[test]
    fn test_help() {
        assert_eq!(parse_args(&args(&["--help"])).unwrap(), None);
    }
}
