use niimbot::{Config, LabelType, Model, PrintOptions, Printer, Raster, Rotation, Threshold};

//
// cargo run --example print label.png
//
#[tokio::main(flavor = "current_thread")]
async fn main() -> niimbot::Result<()> {
    env_logger::init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "label.png".to_string());
    let image = image::open(&path).expect("could not open the label image");
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    println!("printing {path} ({width}x{height})");

    let raster = Raster::new(width, height, rgba.into_raw());
    let options = PrintOptions {
        density: 3,
        label_type: LabelType::Gap,
        copies: 1,
        rotation: Rotation::None,
        threshold: Threshold::Fixed(128),
    };

    let mut printer = Printer::connect(Config::usb(Model::B1)).await?;
    printer.print(&raster, &options).await?;
    printer.close().await
}
