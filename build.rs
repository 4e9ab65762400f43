fn main() {
    #[cfg(target_os = "windows")]
    {
        let mut res = winres::WindowsResource::new();
        res.set("ProductName", "AutoClicker");
        res.set("FileDescription", "AutoClicker - randomized interval mouse clicker");
        res.set("FileVersion", "1.4.0.0");
        res.set("ProductVersion", "1.4.0.0");
        if let Err(e) = res.compile() {
            panic!("Failed to compile Windows resources: {:?}", e);
        }
    }
}
