use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use product_catalog::{
    CatalogConfig, Category, Committed, ImageId, ImageUpload, NewProduct, ProductField, ProductId,
    ProductListQuery, ProductService,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::warn;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_DATA_DIR: &str = "./catalog-data";

#[derive(Parser)]
#[command(name = "catalogctl")]
#[command(about = "Command line access to a local product catalog")]
struct Cli {
    /// Data directory; overrides CATALOG_DATA_DIR
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        price_cents: u64,
        #[arg(long, default_value_t = 0)]
        quantity: u32,
        #[arg(long)]
        category: Category,
        #[arg(long)]
        popular: bool,
        /// Image files, in display order
        #[arg(long = "image", required = true)]
        images: Vec<PathBuf>,
        #[arg(long = "similar")]
        similar: Vec<ProductId>,
    },
    Get {
        ids: Vec<ProductId>,
    },
    List {
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        per_page: Option<u32>,
        #[arg(long)]
        category: Option<Category>,
        #[arg(long)]
        popular: Option<bool>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        in_stock: Option<bool>,
    },
    AddImage {
        product: ProductId,
        file: PathBuf,
    },
    DeleteImage {
        product: ProductId,
        image: ImageId,
    },
    Rearrange {
        product: ProductId,
        order: Vec<ImageId>,
    },
    SetSimilar {
        product: ProductId,
        similar: Vec<ProductId>,
    },
    Edit {
        product: ProductId,
        /// One of name, description, quantity, category, price, popular
        field: String,
        value: String,
    },
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = CatalogConfig::from_env().context("Invalid catalog configuration")?;
    let data_dir = cli
        .data_dir
        .or_else(|| config.data_dir.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
    config = config.data_dir(data_dir);

    let service = ProductService::open(config)
        .await
        .context("Failed to open catalog")?;

    match cli.command {
        Command::Create {
            name,
            description,
            price_cents,
            quantity,
            category,
            popular,
            images,
            similar,
        } => {
            let mut uploads = Vec::with_capacity(images.len());
            for path in &images {
                uploads.push(read_upload(path).await?);
            }
            let request = NewProduct {
                name,
                description,
                price_cents,
                quantity,
                category,
                popular,
                similar_products: similar,
            };
            let outcome = service.create_product(request, uploads).await?;
            print_committed(outcome)
        }
        Command::Get { ids } => match ids.as_slice() {
            [] => Err(anyhow!("Expected at least one product id")),
            [id] => print_json(&service.get_product(*id).await?),
            many => print_json(&service.get_products(many).await?),
        },
        Command::List {
            page,
            per_page,
            category,
            popular,
            name,
            in_stock,
        } => {
            let query = ProductListQuery {
                page,
                per_page,
                category,
                popular,
                name_contains: name,
                in_stock,
                ..Default::default()
            };
            print_json(&service.list_products(query).await?)
        }
        Command::AddImage { product, file } => {
            let upload = read_upload(&file).await?;
            print_committed(service.add_image(product, upload).await?)
        }
        Command::DeleteImage { product, image } => {
            print_committed(service.delete_image(product, image).await?)
        }
        Command::Rearrange { product, order } => {
            print_json(&service.rearrange_images(product, order).await?)
        }
        Command::SetSimilar { product, similar } => {
            print_json(&service.edit_similar_products(product, similar).await?)
        }
        Command::Edit {
            product,
            field,
            value,
        } => {
            let field = parse_field(&field, &value)?;
            print_json(&service.edit_field(product, field).await?)
        }
        Command::Stats => {
            let stats = service.store().transaction_stats();
            println!(
                "Transactions: active={}, committed={}, aborted={}",
                stats.active, stats.committed, stats.aborted
            );
            Ok(())
        }
    }
}

async fn read_upload(path: &Path) -> Result<ImageUpload> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read image '{}'", path.display()))?;
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| anyhow!("Invalid image file name '{}'", path.display()))?;
    Ok(ImageUpload::from_file_name(file_name, bytes)?)
}

fn parse_field(field: &str, value: &str) -> Result<ProductField> {
    let parsed = match field {
        "name" => ProductField::Name(value.to_string()),
        "description" => ProductField::Description(value.to_string()),
        "quantity" => ProductField::Quantity(
            value
                .parse()
                .with_context(|| format!("Invalid quantity '{}'", value))?,
        ),
        "category" => ProductField::Category(value.parse()?),
        "price" => ProductField::Price(
            value
                .parse()
                .with_context(|| format!("Invalid price '{}'", value))?,
        ),
        "popular" => ProductField::Popular(
            value
                .parse()
                .with_context(|| format!("Invalid flag '{}'", value))?,
        ),
        other => return Err(anyhow!("Unknown field '{}'", other)),
    };
    Ok(parsed)
}

fn print_committed<T: Serialize>(outcome: Committed<T>) -> Result<()> {
    for failure in outcome.side_effects() {
        warn!(%failure, "file side effect needs a retry");
    }
    print_json(outcome.value())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to encode output")?;
    println!("{}", json);
    Ok(())
}
