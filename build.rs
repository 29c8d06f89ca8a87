use std::{
    fs,
    io::{self, ErrorKind, Write},
    process::Command,
};

const SHADERS: [(&str, &str); 2] = [
    ("shaders/shader.vert", "target/shaders/vert.spv"),
    ("shaders/shader.frag", "target/shaders/frag.spv"),
];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=shaders/");

    fs::create_dir_all("target/shaders")?;

    for (source, output) in SHADERS {
        let result = match Command::new("glslc").arg(source).arg("-o").arg(output).output() {
            Ok(result) => result,
            // the shaders are only read at runtime, so a missing compiler
            // shouldn't stop the crate from building
            Err(err) if err.kind() == ErrorKind::NotFound => {
                println!("cargo:warning=glslc not found, {source} was not compiled");
                continue;
            }
            Err(err) => return Err(err.into()),
        };
        io::stdout().write_all(&result.stdout)?;
        io::stderr().write_all(&result.stderr)?;
    }

    Ok(())
}
