//! Deployment script generation.
//!
//! Everything that runs on the droplet during a deployment is rendered
//! here as plain strings: the docker-compose manifest, the runtime `.env`
//! file, and the setup command sequence that logs into the registry and
//! brings the stack up. The renderers are pure; identical inputs yield
//! byte-identical scripts, which keeps re-runs diffable in logs.

use rand::Rng;
use shell_escape::unix::escape;

const CPU_LIMIT: &str = "2";
const MEMORY_LIMIT: &str = "2G";
const CPU_RESERVATION: &str = "1";
const MEMORY_RESERVATION: &str = "1G";
const DB_PASSWORD_BYTES: usize = 24;

/// Inputs the script renderers depend on. Built once per deployment from
/// the configuration plus the published image reference and a freshly
/// generated database password.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ScriptInputs {
    /// Fully qualified domain the stack serves.
    pub domain: String,
    /// Image reference the n8n service runs, including tag.
    pub image: String,
    /// Registry host for `docker login`.
    pub registry_host: String,
    /// API token doubling as the registry username and password.
    pub registry_token: String,
    /// n8n credential encryption key.
    pub encryption_key: String,
    /// Basic-auth user protecting the UI.
    pub basic_auth_user: String,
    /// Basic-auth password protecting the UI.
    pub basic_auth_pass: String,
    /// Database password injected into the `.env` file.
    pub db_password: String,
    /// `N8N_EMAIL_MODE` value.
    pub email_mode: String,
}

/// Generates a fresh database password: 48 hex characters from 24 random
/// bytes.
#[must_use]
pub fn generate_db_password() -> String {
    let mut bytes = [0_u8; DB_PASSWORD_BYTES];
    rand::thread_rng().fill(&mut bytes);
    hex::encode(bytes)
}

/// Renders the docker-compose manifest for the stack: the n8n service with
/// resource limits and a healthcheck, postgres 13 behind the `new-install`
/// profile, and the caddy TLS proxy.
#[must_use]
pub fn compose_manifest(inputs: &ScriptInputs) -> String {
    format!(
        r#"version: '3.8'

services:
  n8n:
    image: {image}
    restart: unless-stopped
    ports:
      - "127.0.0.1:5678:5678"
    environment:
      - N8N_HOST=${{N8N_HOST}}
      - N8N_PORT=5678
      - N8N_PROTOCOL=https
      - NODE_ENV=production
      - N8N_ENCRYPTION_KEY=${{N8N_ENCRYPTION_KEY}}
      - DB_TYPE=postgresdb
      - DB_POSTGRESDB_HOST=db
      - DB_POSTGRESDB_DATABASE=n8n
      - DB_POSTGRESDB_USER=n8n
      - DB_POSTGRESDB_PASSWORD=${{DB_PASSWORD}}
      - N8N_EMAIL_MODE=${{N8N_EMAIL_MODE}}
      - N8N_SMTP_HOST=${{N8N_SMTP_HOST}}
      - N8N_SMTP_PORT=${{N8N_SMTP_PORT}}
      - N8N_SMTP_USER=${{N8N_SMTP_USER}}
      - N8N_SMTP_PASS=${{N8N_SMTP_PASS}}
      - N8N_SMTP_SENDER=${{N8N_SMTP_SENDER}}
      - WEBHOOK_URL=${{WEBHOOK_URL}}
      - N8N_BASIC_AUTH_ACTIVE=true
      - N8N_BASIC_AUTH_USER=${{N8N_BASIC_AUTH_USER}}
      - N8N_BASIC_AUTH_PASSWORD=${{N8N_BASIC_AUTH_PASSWORD}}
      - N8N_HIRING_BANNER_ENABLED=false
      - N8N_DIAGNOSTICS_ENABLED=false
      - N8N_METRICS=true
    volumes:
      - n8n_data:/home/node/.n8n
      - /opt/n8n/local_files:/files
    depends_on:
      - db
    networks:
      - n8n_network
    healthcheck:
      test: ["CMD", "curl", "-f", "http://localhost:5678/healthz"]
      interval: 30s
      timeout: 10s
      retries: 3
      start_period: 30s
    deploy:
      resources:
        limits:
          cpus: '{cpu_limit}'
          memory: {memory_limit}
        reservations:
          cpus: '{cpu_reservation}'
          memory: {memory_reservation}
  db:
    image: postgres:13
    restart: unless-stopped
    environment:
      - POSTGRES_DB=n8n
      - POSTGRES_USER=n8n
      - POSTGRES_PASSWORD=${{DB_PASSWORD}}
    volumes:
      - db_data:/var/lib/postgresql/data
    networks:
      - n8n_network
    healthcheck:
      test: ["CMD-SHELL", "pg_isready -U n8n"]
      interval: 10s
      timeout: 5s
      retries: 5
    profiles:
      - new-install
  caddy:
    image: caddy:2
    restart: unless-stopped
    ports:
      - "80:80"
      - "443:443"
    volumes:
      - /opt/n8n/caddy_config/Caddyfile:/etc/caddy/Caddyfile:ro
      - caddy_data:/data
      - caddy_config:/config
    networks:
      - n8n_network
    depends_on:
      - n8n

volumes:
  n8n_data:
  db_data:
  caddy_data:
  caddy_config:

networks:
  n8n_network:
    driver: bridge"#,
        image = inputs.image,
        cpu_limit = CPU_LIMIT,
        memory_limit = MEMORY_LIMIT,
        cpu_reservation = CPU_RESERVATION,
        memory_reservation = MEMORY_RESERVATION,
    )
}

/// Renders the `.env` file docker-compose interpolates at `up` time. The
/// database password is injected as a literal so the file is static.
#[must_use]
pub fn env_file(inputs: &ScriptInputs) -> String {
    format!(
        "N8N_HOST={domain}\n\
         N8N_ENCRYPTION_KEY={encryption_key}\n\
         DB_PASSWORD={db_password}\n\
         N8N_BASIC_AUTH_USER={basic_auth_user}\n\
         N8N_BASIC_AUTH_PASSWORD={basic_auth_pass}\n\
         N8N_EMAIL_MODE={email_mode}\n",
        domain = inputs.domain,
        encryption_key = inputs.encryption_key,
        db_password = inputs.db_password,
        basic_auth_user = inputs.basic_auth_user,
        basic_auth_pass = inputs.basic_auth_pass,
        email_mode = inputs.email_mode,
    )
}

/// Renders the setup command sequence: permissions, registry login, the
/// fresh-install/upgrade branch on `$POSTGRES_EXISTS`, a bounded wait for
/// healthy services, and the operations cron schedule.
#[must_use]
pub fn setup_commands(inputs: &ScriptInputs) -> String {
    let registry_host = escape(inputs.registry_host.as_str().into());
    let token = escape(inputs.registry_token.as_str().into());
    format!(
        r#"# Set proper permissions
chown -R n8n:n8n /opt/n8n
chmod 600 /opt/n8n/.env

# Login to registry
docker login {registry_host} -u {token} -p {token}

# Pull and start services
cd /opt/n8n

# Start services based on PostgreSQL existence
if [ "$POSTGRES_EXISTS" = true ]; then
    docker-compose pull n8n caddy
    docker-compose up -d n8n caddy
else
    docker-compose pull
    docker-compose --profile new-install up -d
fi

# Wait for services to be healthy
echo "Waiting for services to be ready..."
timeout 300 bash -c 'until docker-compose ps | grep -q "(healthy)"; do sleep 5; done'

# Install operations cron schedule
touch /var/log/n8n-monitor.log /var/log/n8n-backup.log
chown n8n:n8n /var/log/n8n-monitor.log /var/log/n8n-backup.log
cat > /etc/cron.d/n8n-ops << 'CRON'
*/5 * * * * n8n cd /opt/n8n && docker-compose exec -T n8n n8n-monitor >> /var/log/n8n-monitor.log 2>&1
0 3 * * * n8n cd /opt/n8n && docker-compose exec -T n8n n8n-backup >> /var/log/n8n-backup.log 2>&1
CRON
chmod 644 /etc/cron.d/n8n-ops"#,
        registry_host = registry_host.as_ref(),
        token = token.as_ref(),
    )
}

/// Assembles the full deployment script run over SSH: detect an existing
/// database container, write the compose manifest and `.env` file, then run
/// the setup commands. The detection runs before the manifest is written so
/// `$POSTGRES_EXISTS` is set when the branch executes.
#[must_use]
pub fn deployment_script(inputs: &ScriptInputs) -> String {
    format!(
        r#"#!/bin/bash
set -e

# Check if PostgreSQL container exists and is running
if docker ps -a --format '{{{{.Names}}}}' | grep -q "^n8n-db-1$"; then
    echo "PostgreSQL container already exists, skipping creation..."
    POSTGRES_EXISTS=true
else
    POSTGRES_EXISTS=false
fi

# Create docker-compose.yml
cat > /opt/n8n/docker-compose.yml << 'EOF'
{compose}
EOF

# Create .env file for docker-compose
cat > /opt/n8n/.env << 'EOF'
{env}EOF

{setup}
"#,
        compose = compose_manifest(inputs),
        env = env_file(inputs),
        setup = setup_commands(inputs),
    )
}
