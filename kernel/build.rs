use std::env;

fn main() {
    let target_os = env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    if target_os == "none" {
        cc::Build::new()
            .file("src/arch/x86/entry.S")
            .file("src/arch/x86/boot.S")
            .compile("trap_entry");
        println!("cargo:rerun-if-changed=src/arch/x86/entry.S");
        println!("cargo:rerun-if-changed=src/arch/x86/boot.S");
        println!(
            "cargo:rustc-link-arg=-T{}/src/arch/x86/link.ld",
            env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR not set")
        );
        println!("cargo:rerun-if-changed=src/arch/x86/link.ld");
    }
}
