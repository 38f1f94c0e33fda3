fn main() {
    // The patch is usually run by hand on the Windows machine that hosts the
    // cash-closing database, so the binary must not depend on an installed
    // Visual C++ runtime.
    static_vcruntime::metabuild();
}
