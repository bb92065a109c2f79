fn main() {
    tablesynth::cli::bin::cli()
}
