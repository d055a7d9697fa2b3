fn main() {
    sensfinder_lib::run()
}
