use niimbot::{Config, InfoKey, Model, Printer};

//
// cargo run --example read_info
//
#[tokio::main(flavor = "current_thread")]
async fn main() -> niimbot::Result<()> {
    env_logger::init();

    let mut printer = Printer::connect(Config::ble(Model::D110).ble_name("D110")).await?;

    for key in [
        InfoKey::DeviceSerial,
        InfoKey::SoftVersion,
        InfoKey::HardVersion,
        InfoKey::Battery,
        InfoKey::Density,
        InfoKey::LabelType,
    ] {
        match printer.info(key).await {
            Ok(value) => println!("{key:?}: {value:?}"),
            Err(err) => println!("{key:?}: {err}"),
        }
    }

    let beat = printer.heartbeat().await?;
    println!("heartbeat: {beat:?}");

    if let Some(tag) = printer.rfid().await? {
        println!("label roll: {tag:?}");
    } else {
        println!("no rfid tag detected");
    }

    printer.close().await
}
