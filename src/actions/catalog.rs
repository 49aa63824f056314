use crate::core::{Action, Probe};

pub const SYSTEM: &str = "system";
pub const IPCONFIG: &str = "ipconfig";
pub const NETUSE: &str = "netuse";
pub const PRODUCTS: &str = "products";
pub const VPN: &str = "vpn";
pub const SERVICES: &str = "services";
pub const USERS: &str = "users";
pub const USB: &str = "usb";
pub const CHECK_HEALTH: &str = "check-health";

const USB_DEVICES_SCRIPT: &str = r#"
$usbDevices = Get-PnpDevice -PresentOnly |
    Where-Object {
        $_.InstanceId -match '^USB' -and
        $_.FriendlyName -and
        $_.Manufacturer -and
        $_.Manufacturer -notmatch 'Standard system devices' -and
        $_.Manufacturer -notmatch 'Standard USB Host Controller' -and
        $_.Manufacturer -notmatch 'Standard USB HUBs' -and
        $_.Manufacturer -notmatch 'Generic USB Audio' -and
        $_.Class -notmatch 'HIDClass'
    } |
    Select-Object FriendlyName, Manufacturer, Class

if (!$usbDevices) {
    Write-Output "No external USB devices detected."
} else {
    $usbDevices | ForEach-Object {
        Write-Output ("• " + $_.FriendlyName)
        Write-Output ("    Manufacturer: " + $_.Manufacturer)
        if ($_.Class) { Write-Output ("    Type:         " + $_.Class) }
        Write-Output ""
    }
}
"#;

/// The read-only probes, in report order.
pub fn standard_actions() -> Vec<Action> {
    vec![
        Action::new(
            SYSTEM,
            Probe::new("systeminfo | Select-String 'OS Name','OS Version'"),
        ),
        Action::new(IPCONFIG, Probe::new("ipconfig /all")),
        Action::new(NETUSE, Probe::new("net use")),
        Action::new(
            PRODUCTS,
            Probe::new(
                r"Get-ItemProperty HKLM:\Software\Microsoft\Windows\CurrentVersion\Uninstall\* | Select-Object DisplayName,DisplayVersion",
            ),
        ),
        Action::new(VPN, Probe::new("Get-VpnConnection")),
        Action::new(
            SERVICES,
            Probe::new(
                "Get-Service | Where-Object {$_.Status -eq 'Running'} | Select-Object DisplayName,Name,StartType",
            ),
        ),
        Action::new(
            USERS,
            Probe::new(
                "Get-LocalUser | Select-Object Name,Enabled,PasswordExpires,PasswordLastSet,LastLogon",
            ),
        ),
        Action::new(USB, Probe::new(USB_DEVICES_SCRIPT.trim())),
        Action::new(
            CHECK_HEALTH,
            Probe::new("Dism /Online /Cleanup-Image /CheckHealth"),
        ),
    ]
}

/// Single-shot operations that change the system. All of them are gated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutatingOp {
    FlushDns,
    WingetUpdate,
    ScanHealth,
    RestoreHealth,
}

impl MutatingOp {
    pub const fn id(self) -> &'static str {
        match self {
            MutatingOp::FlushDns => "flush-dns",
            MutatingOp::WingetUpdate => "winget-update",
            MutatingOp::ScanHealth => "scan-health",
            MutatingOp::RestoreHealth => "restore-health",
        }
    }

    pub const fn operation(self) -> &'static str {
        match self {
            MutatingOp::FlushDns => "Flushing DNS",
            MutatingOp::WingetUpdate => "Running winget upgrade",
            MutatingOp::ScanHealth => "Scanning health",
            MutatingOp::RestoreHealth => "Restoring health",
        }
    }

    pub const fn script(self) -> &'static str {
        match self {
            MutatingOp::FlushDns => "ipconfig /flushdns",
            MutatingOp::WingetUpdate => {
                "winget upgrade --accept-source-agreements --accept-package-agreements"
            }
            MutatingOp::ScanHealth => "Dism /Online /Cleanup-Image /ScanHealth",
            MutatingOp::RestoreHealth => "Dism /Online /Cleanup-Image /RestoreHealth",
        }
    }

    pub fn probe(self) -> Probe {
        Probe::gated(self.script(), self.operation())
    }
}

pub fn trace_route_script(host: &str, max_hops: u32) -> String {
    format!("tracert -d -h {max_hops} {host}")
}

pub fn ping_script(host: &str) -> String {
    format!("Test-Connection -ComputerName {host} -Count 4")
}
