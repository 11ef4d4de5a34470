//! Check system capabilities.

use zoomreel_render_engine::command_exists;

pub fn run() -> anyhow::Result<()> {
    println!("Zoomreel System Check");
    println!("{}", "=".repeat(50));

    let mut all_ok = true;
    for (binary, purpose) in [
        ("ffmpeg", "frame decoding and export encoding"),
        ("ffprobe", "source size and duration"),
    ] {
        if command_exists(binary) {
            println!("[OK] {binary}: found ({purpose})");
        } else {
            println!("[MISSING] {binary}: not on PATH ({purpose})");
            all_ok = false;
        }
    }

    println!();
    if all_ok {
        println!("All required tools are available. Zoomreel can export.");
    } else {
        println!("Install ffmpeg (which ships ffprobe) to enable exports.");
    }

    Ok(())
}
