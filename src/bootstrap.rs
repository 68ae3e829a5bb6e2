//! First-boot provisioning scripts for the droplet.
//!
//! Two scripts run exactly once in a droplet's life: the cloud-init
//! user-data (hardening, app directories, Caddy configuration) executed by
//! the image on first boot, and the user bootstrap executed over SSH as
//! root once the droplet reports `active`. Both are pure renderers.

/// Renders the cloud-init user-data for a new droplet.
///
/// The script updates the system, locks the firewall down to SSH/HTTP/HTTPS,
/// enables fail2ban, prepares `/opt/n8n`, and writes a Caddyfile proxying
/// `domain` to the n8n container.
#[must_use]
pub fn first_boot_script(domain: &str) -> String {
    format!(
        r"#!/bin/bash
set -e

# System updates
apt-get update
apt-get upgrade -y

# Install required packages
apt-get install -y \
    apt-transport-https \
    ca-certificates \
    curl \
    software-properties-common \
    fail2ban \
    ufw \
    git \
    jq

# Configure UFW
ufw default deny incoming
ufw default allow outgoing
ufw allow ssh
ufw allow http
ufw allow https
yes | ufw enable

# Configure fail2ban
cat > /etc/fail2ban/jail.local << EOF
[sshd]
enabled = true
bantime = 3600
findtime = 600
maxretry = 3
EOF

systemctl enable fail2ban
systemctl start fail2ban

# Create app directories
mkdir -p /opt/n8n/{{caddy_config,local_files}}

# Clone n8n-docker-caddy repository
cd /opt/n8n
git clone https://github.com/n8n-io/n8n-docker-caddy.git
mv n8n-docker-caddy/* .
rm -rf n8n-docker-caddy

# Create Caddyfile
cat > /opt/n8n/caddy_config/Caddyfile << EOF
{domain} {{
    reverse_proxy n8n:5678 {{
        flush_interval -1
    }}
}}
EOF
"
    )
}

/// Script run over SSH as root once a freshly created droplet is active.
///
/// Creates the unprivileged `n8n` account the deployment runs under, copies
/// root's authorized keys across, and pre-creates the docker volumes the
/// compose stack mounts.
#[must_use]
pub const fn user_bootstrap_script() -> &'static str {
    r#"#!/bin/bash
set -e

# Create n8n user
useradd -m -s /bin/bash n8n

# Add to sudo group
usermod -aG sudo n8n
usermod -aG docker n8n

# Set up SSH directory
mkdir -p /home/n8n/.ssh
chmod 700 /home/n8n/.ssh

# Copy SSH key
cp /root/.ssh/authorized_keys /home/n8n/.ssh/
chown -R n8n:n8n /home/n8n/.ssh
chmod 600 /home/n8n/.ssh/authorized_keys

# Set up sudoers
echo "n8n ALL=(ALL) NOPASSWD:ALL" > /etc/sudoers.d/n8n
chmod 440 /etc/sudoers.d/n8n

# Create necessary directories
mkdir -p /opt/n8n/{caddy_config,local_files}
chown -R n8n:n8n /opt/n8n

# Create docker volumes
docker volume create caddy_data
docker volume create n8n_data

# Set proper permissions
chown -R n8n:n8n /opt/n8n
"#
}
