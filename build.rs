fn main() {
    // Records RUSTC_VERSION and the Cargo.lock dependency list into OUT_DIR/built.rs.
    built::write_built_file().expect("failed to acquire build-time information");
}
