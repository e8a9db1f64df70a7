use triangle_tutorials::{app, config::Tutorial, logging};

fn main() {
    logging::init();
    if let Err(err) = app::run(Tutorial::imgui_overlay()) {
        log::error!("{:?}", err);
        std::process::exit(1);
    }
}
