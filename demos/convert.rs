use anyhow::{bail, Context};
use tmx_map::{TmxReader, TmxWriter, WriterOptions};

// Usage: convert <input.tmx[.gz]> <output.tmx[.gz]> [options.json]
fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (input, output) = match args.as_slice() {
        [input, output, ..] => (input, output),
        _ => bail!("usage: convert <input> <output> [options.json]"),
    };

    let options = match args.get(2) {
        Some(path) => WriterOptions::from_json_file(path)
            .with_context(|| format!("loading writer options from {path}"))?,
        None => WriterOptions::default(),
    };

    let map = TmxReader::default()
        .read_map(input)
        .with_context(|| format!("reading {input}"))?;

    println!(
        "{}x{} map, tilesets={} layers={}",
        map.width(),
        map.height(),
        map.tilesets().len(),
        map.layer_count()
    );

    TmxWriter::new(options)
        .write_map(&map, output)
        .with_context(|| format!("writing {output}"))?;
    Ok(())
}
