fn main() {
    callqueue::app::startup::startup();
}
